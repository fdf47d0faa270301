// Command-line definition

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::MAX_TELEMETRY_INTERVAL_MINUTES;

#[derive(Parser, Debug)]
#[command(name = "cybersensei-node")]
#[command(bin_name = "cybersensei-node")]
#[command(about = "Keeps a CyberSensei node updated and reports its telemetry to Central")]
#[command(version)]
#[command(author = "CyberSensei Contributors")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (default: <config dir>/cybersensei/node.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Warnings and errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Check for, download and apply update packages
    Update {
        #[command(subcommand)]
        action: UpdateAction,
    },

    /// Push usage telemetry to Central
    Telemetry {
        #[command(subcommand)]
        action: TelemetryAction,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum UpdateAction {
    /// Ask Central whether a newer version exists
    Check,

    /// Check, then download, verify and apply any available update
    Run,

    /// Apply a package already on disk
    Apply {
        /// Package archive
        #[arg(value_name = "PACKAGE")]
        package: PathBuf,

        /// Install directory (default: from configuration)
        #[arg(long, value_name = "DIR")]
        install_dir: Option<PathBuf>,
    },

    /// List backups of the install directory
    Backups {
        #[arg(long, value_name = "DIR")]
        install_dir: Option<PathBuf>,
    },

    /// Replace the install directory with a backup
    Restore {
        /// Backup directory, as listed by `update backups`
        #[arg(value_name = "BACKUP")]
        backup: PathBuf,

        #[arg(long, value_name = "DIR")]
        install_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum TelemetryAction {
    /// Send periodically until interrupted, with a final report on exit
    Run {
        /// Minutes between sends, at most one week (default: from configuration)
        #[arg(
            long,
            value_name = "N",
            value_parser = clap::value_parser!(u64).range(1..=MAX_TELEMETRY_INTERVAL_MINUTES)
        )]
        interval_minutes: Option<u64>,
    },

    /// Send one sample now
    Send,
}
