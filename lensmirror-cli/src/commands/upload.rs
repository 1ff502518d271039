//! Upload command - share a captured photo or video behind a QR code

use anyhow::{Context, Result};
use clap::Args;
use lensmirror_core::{
    config::ConfigFile,
    share::{Artifact, PreviewSession},
};
use std::path::PathBuf;

/// Arguments for the upload command
#[derive(Args)]
pub struct UploadArgs {
    /// Photo (jpg/png) or video (mp4/mov) to share
    path: PathBuf,

    /// Also write the QR code to this PNG file
    #[arg(long)]
    qr_png: Option<PathBuf>,

    /// Override the upload endpoint
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Pixels per QR module in the PNG
    #[arg(long)]
    module_size: Option<u32>,
}

/// Upload an artifact and print its share link as a QR code
pub async fn upload(args: UploadArgs, config: &ConfigFile) -> Result<()> {
    let mut settings = config.upload_settings().context("Invalid [upload] settings")?;
    if let Some(endpoint) = args.endpoint {
        settings = settings.with_endpoint(endpoint);
    }
    let module_size = args.module_size.unwrap_or(settings.qr_module_size);

    let artifact = Artifact::from_path(&args.path)
        .with_context(|| format!("Failed to load {}", args.path.display()))?;
    println!("Uploading {} to {}...", artifact.kind(), settings.endpoint);

    let preview = PreviewSession::new(artifact, &settings).context("Failed to set up upload")?;
    let shared = preview.upload().await.context("Upload failed")?;

    println!("\n{}", shared.qr.to_terminal());
    println!("Share link: {}", shared.url);

    if let Some(path) = args.qr_png {
        shared
            .qr
            .save_png(&path, module_size)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("QR code saved to {}", path.display());
    }

    preview.dismiss_qr();
    Ok(())
}
