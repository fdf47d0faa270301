// Telemetry commands

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use cybersensei_http::shared_client;
use cybersensei_telemetry::{run_daily_rollover, TelemetryClient};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::TelemetryAction;
use crate::config::{telemetry_interval_from_minutes, NodeConfig};
use crate::output::OutputStyle;

const ROLLOVER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn execute(config: &NodeConfig, action: TelemetryAction) -> Result<()> {
    match action {
        TelemetryAction::Run { interval_minutes } => run(config, interval_minutes).await,
        TelemetryAction::Send => send(config).await,
    }
}

fn client(config: &NodeConfig) -> Result<TelemetryClient> {
    config.validate()?;
    let http = shared_client(config.telemetry_http_config()).context("cannot build HTTP client")?;
    Ok(TelemetryClient::new(http, config.telemetry_settings()))
}

async fn run(config: &NodeConfig, interval_minutes: Option<u64>) -> Result<()> {
    let client = client(config)?;
    let interval = match interval_minutes {
        Some(minutes) => telemetry_interval_from_minutes(minutes)
            .map_err(|e| anyhow!("--interval-minutes {e}"))?,
        None => config.telemetry_interval(),
    };

    let style = OutputStyle::default();

    if !client.start(interval) {
        bail!("telemetry could not be started");
    }
    println!(
        "{}",
        style.info(&format!(
            "Sending telemetry every {} min; Ctrl-C to stop",
            interval.as_secs() / 60
        ))
    );

    let cancel = CancellationToken::new();
    let rollover = tokio::spawn(run_daily_rollover(client.clone(), cancel.clone()));

    shutdown_signal().await;

    client.stop();
    cancel.cancel();
    let _ = tokio::time::timeout(ROLLOVER_SHUTDOWN_TIMEOUT, rollover).await;

    if client.send_final_report().await {
        println!("{}", style.success("Final telemetry report sent"));
    } else {
        println!("{}", style.warning("Final telemetry report was not accepted"));
    }
    Ok(())
}

async fn send(config: &NodeConfig) -> Result<()> {
    let client = client(config)?;
    if !client.send_telemetry().await {
        bail!("telemetry was not accepted by Central");
    }
    println!("{}", OutputStyle::default().success("Telemetry sent"));
    Ok(())
}

/// Resolves on SIGINT (Ctrl-C) or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT (Ctrl-C), shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
