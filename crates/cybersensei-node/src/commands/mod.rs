// Command handlers for the node agent

pub mod telemetry;
pub mod update;

use anyhow::Result;

use crate::cli::{Cli, Commands};
use crate::config::NodeConfig;

/// Load configuration and run the selected command
pub async fn execute(cli: Cli) -> Result<()> {
    let config = NodeConfig::load(cli.config.as_deref())?;
    tracing::debug!(?config, "Configuration loaded");

    match cli.command {
        Commands::Update { action } => update::execute(&config, action).await,
        Commands::Telemetry { action } => telemetry::execute(&config, action).await,
    }
}
