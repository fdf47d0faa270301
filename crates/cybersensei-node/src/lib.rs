//! CyberSensei node agent
//!
//! Library half of the `cybersensei-node` binary: command-line definition,
//! configuration loading, logging setup and the update/telemetry commands.

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod output;

pub use cli::Cli;
pub use config::{ConfigError, NodeConfig};
