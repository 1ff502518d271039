//! Lensmirror CLI
//!
//! Mirrored camera input, lens remote APIs and capture sharing.
//!
//! # Usage
//!
//! ```bash
//! # Drive the mirror input with a simulated camera
//! lensmirror simulate --switch-every 2
//!
//! # Serve the lens remote APIs and fire a capture trigger at them
//! lensmirror serve
//! lensmirror trigger video --duration 5
//!
//! # Share a capture behind a QR code
//! lensmirror upload photo.jpg --qr-png share.png
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use lensmirror_core::{config::ConfigFile, MirrorError};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Lensmirror - mirrored camera input and lens remote APIs
#[derive(Parser)]
#[command(name = "lensmirror")]
#[command(version)]
#[command(about = "Mirrored camera input, lens remote APIs and capture sharing", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file to use instead of the default location
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the mirror input against a simulated camera
    #[command(alias = "sim")]
    Simulate(commands::SimulateArgs),

    /// Send a capture trigger to a running bridge
    Trigger(commands::TriggerArgs),

    /// Fetch from the cat fact relay
    Fact(commands::FactArgs),

    /// Upload a photo or video and show its QR code
    Upload(commands::UploadArgs),

    /// Serve the lens remote APIs over HTTP
    Serve(commands::ServeArgs),

    /// Manage configuration
    Config(commands::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(format!("lensmirror={}", level).parse()?),
        )
        .with_target(false)
        .init();

    let result = run(cli).await;
    if let Err(e) = &result {
        if let Some(hint) = e
            .chain()
            .find_map(|cause| cause.downcast_ref::<MirrorError>())
            .and_then(MirrorError::user_hint)
        {
            eprintln!("hint: {}", hint);
        }
    }
    result
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;

    match cli.command {
        Commands::Simulate(args) => commands::simulate(args, &load_config(config_path)?).await?,
        Commands::Trigger(args) => commands::trigger(args, &load_config(config_path)?).await?,
        Commands::Fact(args) => commands::fact(args, &load_config(config_path)?).await?,
        Commands::Upload(args) => commands::upload(args, &load_config(config_path)?).await?,
        Commands::Serve(args) => commands::serve(args, &load_config(config_path)?).await?,
        Commands::Config(args) => {
            let path = config_path.unwrap_or_else(ConfigFile::default_path);
            commands::config(args, path).await?
        }
    }

    Ok(())
}

/// An explicit --config must load; the default location falls back to defaults
fn load_config(path: Option<PathBuf>) -> Result<ConfigFile> {
    match path {
        Some(path) => Ok(ConfigFile::load_from(path)?),
        None => Ok(ConfigFile::load_or_default()),
    }
}
