//! Simulate command - drive the mirror input with a simulated camera

use anyhow::{Context, Result};
use clap::Args;
use lensmirror_core::{
    config::ConfigFile,
    input::{InputDestination, MirrorInput},
    session::{CaptureSession, SimulatedSession},
    types::{Frame, Position},
    InputAttributes,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

/// Arguments for the simulate command
#[derive(Args)]
pub struct SimulateArgs {
    /// Camera to start with (front, back); defaults to the config file
    #[arg(short, long)]
    position: Option<String>,

    /// Frames per second delivered by the simulated camera
    #[arg(long, default_value = "30")]
    fps: u32,

    /// Seconds to run (0 = until Ctrl+C)
    #[arg(short, long, default_value = "5")]
    duration: u64,

    /// Switch between front and back cameras every N seconds
    #[arg(short, long)]
    switch_every: Option<u64>,

    /// Stop, interrupt and restart the session halfway through
    #[arg(long)]
    restart: bool,
}

/// Counts frames handed to the renderer
#[derive(Default)]
struct FrameCounter {
    frames: AtomicU64,
}

impl InputDestination for FrameCounter {
    fn input_changed_attributes(&self, attributes: &InputAttributes) {
        println!(
            "  [attributes] {} camera, {}, mirrored: {}, video: {}, frame: {}, fov: {:.1}°",
            attributes.position,
            attributes.frame_size,
            attributes.mirrored,
            attributes.video_orientation,
            attributes.frame_orientation,
            attributes.field_of_view
        );
    }

    fn input_received_frame(&self, _frame: &Frame) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }
}

/// Run a blocking input call off the async runtime
///
/// Input mutations wait on the configuration thread.
async fn with_input<T, F>(input: &Arc<MirrorInput>, call: F) -> Result<T>
where
    F: FnOnce(&MirrorInput) -> lensmirror_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let input = Arc::clone(input);
    let result = tokio::task::spawn_blocking(move || call(&input))
        .await
        .context("Input task failed")?;
    Ok(result?)
}

/// Run the mirror input against a simulated capture session
pub async fn simulate(args: SimulateArgs, config: &ConfigFile) -> Result<()> {
    println!("Lensmirror - Simulated Capture\n");

    let mut settings = config.input_settings().context("Invalid [camera] settings")?;
    if let Some(position) = &args.position {
        settings.position = position
            .parse::<Position>()
            .map_err(|e| anyhow::anyhow!(e))?;
    }

    let session = Arc::new(SimulatedSession::new());
    let backend: Arc<dyn CaptureSession> = session.clone();
    let input = tokio::task::spawn_blocking(move || MirrorInput::new(backend, settings))
        .await
        .context("Input task failed")?
        .map(Arc::new)
        .context("Failed to create input")?;
    let counter = Arc::new(FrameCounter::default());
    input.set_destination(Some(counter.clone()));

    let attributes = input.attributes();
    println!("Configuration:");
    println!("  Camera:      {}", attributes.position);
    println!("  Frame size:  {}", attributes.frame_size);
    println!("  Field of view: {:.1}°", attributes.field_of_view);
    println!("  Mirrored:    {}", attributes.mirrored);
    println!("  Frame rate:  {} fps", args.fps);
    println!();

    with_input(&input, |input| input.start_running())
        .await
        .context("Failed to start capture")?;
    session
        .start_delivery(args.fps)
        .context("Failed to start frame delivery")?;

    println!("Capture running. Press Ctrl+C to stop...\n");

    let run = async {
        let started = tokio::time::Instant::now();
        let mut ticks = 0u64;
        let mut restarted = false;
        loop {
            tokio::time::sleep(Duration::from_secs(1)).await;
            ticks += 1;

            if let Some(every) = args.switch_every.filter(|every| *every > 0) {
                if ticks % every == 0 {
                    let target = input.position().opposite();
                    match with_input(&input, move |input| input.set_position(target)).await {
                        Ok(()) => info!("Switched to {} camera", target),
                        Err(e) => warn!("Camera switch failed: {:#}", e),
                    }
                }
            }

            if args.restart && !restarted && args.duration > 0 && ticks * 2 >= args.duration {
                restarted = true;
                println!("  [session] stopping, interrupting and restarting");
                with_input(&input, |input| input.stop_running()).await?;
                session.interrupt();
                with_input(&input, |input| input.start_running()).await?;
            }

            if args.duration > 0 && started.elapsed() >= Duration::from_secs(args.duration) {
                break;
            }
        }
        Ok::<_, anyhow::Error>(())
    };

    tokio::select! {
        result = signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
            println!("\nReceived interrupt signal...");
        }
        result = run => {
            result.context("Capture failed")?;
        }
    }

    println!("Stopping capture...");
    session.stop_delivery();
    with_input(&input, |input| input.stop_running())
        .await
        .context("Failed to stop capture")?;

    println!(
        "Capture stopped after {} frames.",
        counter.frames.load(Ordering::Relaxed)
    );
    Ok(())
}
