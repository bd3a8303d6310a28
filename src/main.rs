use anyhow::{Context, Result};
use clap::Parser;
use log::info;

mod body;
mod config;
mod error;
mod fetch;
mod output;
mod progress;
#[cfg(test)]
mod test_server;

use config::{Cli, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::resolve(Cli::parse()).context("failed to load configuration")?;

    env_logger::Builder::new()
        .filter_level(settings.log_level())
        .init();
    info!("Url: {}", settings.url);

    let client = fetch::build_client(&settings)?;
    let fetched = fetch::fetch(&client, &settings)
        .await
        .with_context(|| format!("failed to fetch {}", settings.url))?;
    info!(
        "Status: {} from {} after {} request(s)",
        fetched.status(),
        fetched.url,
        fetched.requests
    );

    output::materialize(fetched, &settings).await?;

    Ok(())
}
