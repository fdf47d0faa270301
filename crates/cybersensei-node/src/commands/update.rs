// Update commands

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cybersensei_http::shared_client;
use cybersensei_updates::{installer, UpdateCheckResult, UpdateClient, UpdateOutcome};

use crate::cli::UpdateAction;
use crate::config::NodeConfig;
use crate::output::{format_bytes, OutputStyle};

pub async fn execute(config: &NodeConfig, action: UpdateAction) -> Result<()> {
    match action {
        UpdateAction::Check => check(config).await,
        UpdateAction::Run => run(config).await,
        UpdateAction::Apply {
            package,
            install_dir,
        } => apply(config, &package, install_dir).await,
        UpdateAction::Backups { install_dir } => backups(&resolve(config, install_dir)).await,
        UpdateAction::Restore {
            backup,
            install_dir,
        } => restore(&backup, &resolve(config, install_dir)).await,
    }
}

fn resolve(config: &NodeConfig, install_dir: Option<PathBuf>) -> PathBuf {
    install_dir.unwrap_or_else(|| config.install_dir.clone())
}

fn client(config: &NodeConfig) -> Result<UpdateClient> {
    config.validate()?;
    let http = shared_client(config.http_config()).context("cannot build HTTP client")?;
    Ok(UpdateClient::new(http, config.update_settings()))
}

async fn check(config: &NodeConfig) -> Result<()> {
    let client = client(config)?;
    let result = client
        .check_for_updates()
        .await
        .context("update check failed")?;
    print_check(&OutputStyle::default(), &result);
    Ok(())
}

async fn run(config: &NodeConfig) -> Result<()> {
    let client = client(config)?;
    let style = OutputStyle::default();

    match client.perform_update_if_available().await? {
        UpdateOutcome::UpToDate(result) => print_check(&style, &result),
        UpdateOutcome::Applied(report) => {
            println!(
                "{}",
                style.success(&format!("Updated to {}", report.manifest.version))
            );
            println!("{}", style.field("Files", &report.files_extracted.to_string()));
            if let Some(backup) = &report.backup {
                println!("{}", style.field("Backup", &backup.display().to_string()));
            }
            println!("{}", style.warning("Restart the CyberSensei service to run the new version"));
        }
    }
    Ok(())
}

async fn apply(config: &NodeConfig, package: &Path, install_dir: Option<PathBuf>) -> Result<()> {
    let client = client(config)?;
    let install_dir = resolve(config, install_dir);
    let style = OutputStyle::default();

    let report = client.apply_update(package, &install_dir).await?;

    println!(
        "{}",
        style.success(&format!(
            "Applied {} to {}",
            report.manifest.version,
            install_dir.display()
        ))
    );
    println!("{}", style.field("Files", &report.files_extracted.to_string()));
    match &report.backup {
        Some(backup) => println!("{}", style.field("Backup", &backup.display().to_string())),
        None => println!("{}", style.field("Backup", "none (new install)")),
    }
    println!("{}", style.warning("Restart the CyberSensei service to run the new version"));
    Ok(())
}

async fn backups(install_dir: &Path) -> Result<()> {
    let style = OutputStyle::default();
    let backups = installer::list_backups(install_dir).await?;

    if backups.is_empty() {
        println!("{}", style.info(&format!("No backups of {}", install_dir.display())));
        return Ok(());
    }

    println!("{}", style.header(&format!("Backups of {}", install_dir.display())));
    for backup in backups {
        let created = backup
            .created_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_string());
        println!(
            "  {}  {}  {}",
            backup.path.display(),
            created,
            format_bytes(backup.size_bytes)
        );
    }
    Ok(())
}

async fn restore(backup: &Path, install_dir: &Path) -> Result<()> {
    installer::restore_backup(backup, install_dir).await?;
    println!(
        "{}",
        OutputStyle::default().success(&format!(
            "Restored {} from {}",
            install_dir.display(),
            backup.display()
        ))
    );
    Ok(())
}

pub(crate) fn print_check(style: &OutputStyle, result: &UpdateCheckResult) {
    let Some(package) = &result.package else {
        let message = result.message.as_deref().unwrap_or("No update available");
        println!("{}", style.success(message));
        println!("{}", style.field("Current", &result.current_version));
        if let Some(latest) = &result.latest_version {
            println!("{}", style.field("Latest", latest));
        }
        return;
    };

    println!(
        "{}",
        style.info(&format!(
            "Update available: {} -> {}",
            result.current_version, package.version
        ))
    );
    println!("{}", style.field("Size", &format_bytes(package.file_size)));
    println!("{}", style.field("Checksum", &package.checksum));
    if let Some(required) = &package.required_runtime_version {
        println!("{}", style.field("Requires", required));
    }
    if package.security_update {
        println!("{}", style.warning("Security update"));
    }
    if package.breaking {
        println!("{}", style.warning("Contains breaking changes"));
    }
    if !package.changelog.is_empty() {
        println!("{}", style.header("Changelog"));
        for line in package.changelog.lines() {
            println!("  {line}");
        }
    }
}
