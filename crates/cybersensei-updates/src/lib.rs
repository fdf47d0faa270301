//! Update client for CyberSensei nodes
//!
//! Asks the Central service for newer packages, streams them to disk,
//! verifies their SHA-256 checksum, backs up the install directory and
//! extracts the package over it. Nothing is applied unless the checksum
//! matches, and nothing is restarted or rolled back automatically.

pub mod checker;
pub mod checksum;
pub mod downloader;
pub mod error;
pub mod installer;
pub mod models;
pub mod updater;

pub use checker::UpdateChecker;
pub use downloader::PackageDownloader;
pub use error::{Result, UpdateError};
pub use installer::{list_backups, restore_backup, BackupInfo};
pub use models::{
    ApplyReport, DownloadedPackage, PackageManifest, UpdateCheckResult, UpdateOutcome,
    UpdatePackage, UpdateState,
};
pub use updater::{UpdateClient, UpdateSettings};
