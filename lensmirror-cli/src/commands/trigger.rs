//! Trigger command - send a lens capture trigger to a running bridge

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use lensmirror_core::{
    config::ConfigFile,
    remote::{bridge::LENS_ID_HEADER, lens::LensTrigger},
};

#[derive(Clone, Copy, ValueEnum)]
pub enum CaptureKind {
    Photo,
    Video,
}

/// Arguments for the trigger command
#[derive(Args)]
pub struct TriggerArgs {
    /// What to capture
    #[arg(value_enum, default_value = "photo")]
    kind: CaptureKind,

    /// Duration hint for videos
    #[arg(short, long)]
    duration: Option<String>,

    /// Lens id sent to the bridge
    #[arg(long, default_value = "cli")]
    lens_id: String,

    /// Bridge base URL; defaults to localhost on the configured port
    #[arg(long)]
    url: Option<String>,
}

/// Post a trigger the way a lens does and print the reply
pub async fn trigger(args: TriggerArgs, config: &ConfigFile) -> Result<()> {
    let settings = config.remote_api_settings();
    let base = args
        .url
        .unwrap_or_else(|| format!("http://127.0.0.1:{}", settings.bridge_port));

    let lens = LensTrigger::default();
    let request = match args.kind {
        CaptureKind::Photo => lens.photo(),
        CaptureKind::Video => lens.video(args.duration.as_deref()),
    };

    let url = format!(
        "{}/remote/{}/{}",
        base.trim_end_matches('/'),
        settings.capture_spec_id,
        request.endpoint_id
    );

    let response = reqwest::Client::new()
        .post(&url)
        .header(LENS_ID_HEADER, &args.lens_id)
        .body(request.body)
        .send()
        .await
        .with_context(|| format!("Failed to reach the bridge at {} (is `lensmirror serve` running?)", base))?;

    let status = response.status();
    let body = response.text().await.context("Failed to read bridge reply")?;
    println!("{} {}", status.as_u16(), body);

    if !status.is_success() {
        bail!("Bridge rejected the trigger");
    }
    Ok(())
}
