//! Serve command - run the lens bridge

use anyhow::{Context, Result};
use clap::Args;
use lensmirror_core::{
    config::ConfigFile,
    remote::{bridge, RemoteApiRegistry, TriggerBus},
};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Arguments for the serve command
#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on; defaults to the config file
    #[arg(short, long)]
    port: Option<u16>,
}

/// Serve the lens remote APIs over HTTP until interrupted
pub async fn serve(args: ServeArgs, config: &ConfigFile) -> Result<()> {
    println!("Lensmirror - Lens Bridge\n");

    let settings = config.remote_api_settings();
    let port = args.port.unwrap_or(settings.bridge_port);

    let bus = TriggerBus::new();
    let registry = Arc::new(
        RemoteApiRegistry::with_default_services(
            &settings,
            bus.clone(),
            tokio::runtime::Handle::current(),
        )
        .context("Failed to set up remote API services")?,
    );

    println!("Remote APIs:");
    println!("  Capture:   {}", settings.capture_spec_id);
    println!("  Cat facts: {} -> {}", settings.catfact_spec_id, settings.catfact_base_url);
    println!();
    println!("Listening on http://127.0.0.1:{}", port);
    println!("  POST /remote/<spec-id>/<endpoint>");
    println!("  GET  /health");
    println!();
    println!("Press Ctrl+C to stop...\n");

    let mut triggers = bus.subscribe();
    let listener = tokio::spawn(async move {
        loop {
            match triggers.recv().await {
                Ok(trigger) => {
                    let payload = serde_json::Value::Object(trigger.request.payload());
                    println!("  [{}] lens {}: {}", trigger.name(), trigger.lens_id, payload);
                }
                Err(RecvError::Lagged(skipped)) => warn!("Missed {} capture triggers", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    tokio::select! {
        result = signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
            println!("\nReceived interrupt signal...");
        }
        result = bridge::serve(registry, port) => {
            result.context("Bridge server failed")?;
        }
    }

    listener.abort();
    info!("Lens bridge stopped");
    println!("Bridge stopped.");
    Ok(())
}
