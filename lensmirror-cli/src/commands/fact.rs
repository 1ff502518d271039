//! Fact command - call the cat fact relay in-process

use anyhow::{bail, Context, Result};
use clap::Args;
use lensmirror_core::{
    config::ConfigFile,
    remote::{RemoteApiOutcome, RemoteApiRegistry, RemoteApiRequest, ResponseStatus, TriggerBus},
};

/// Arguments for the fact command
#[derive(Args)]
pub struct FactArgs {
    /// Endpoint to call on the cat fact API
    #[arg(default_value = "fact")]
    endpoint: String,
}

/// Route one request through the relay and print the response body
pub async fn fact(args: FactArgs, config: &ConfigFile) -> Result<()> {
    let settings = config.remote_api_settings();
    let registry = RemoteApiRegistry::with_default_services(
        &settings,
        TriggerBus::new(),
        tokio::runtime::Handle::current(),
    )
    .context("Failed to set up remote API services")?;

    let request = RemoteApiRequest::new(args.endpoint.clone());

    match registry.call(&settings.catfact_spec_id, "cli", request).await {
        RemoteApiOutcome::Answered(response) => {
            println!("{}", response.body_text());
            if response.status == ResponseStatus::BadRequest {
                bail!("Cat fact request failed");
            }
        }
        RemoteApiOutcome::Ignored => bail!("Endpoint '{}' cannot be relayed", args.endpoint),
        RemoteApiOutcome::UnknownSpec => bail!("Cat fact relay is not registered"),
    }
    Ok(())
}
