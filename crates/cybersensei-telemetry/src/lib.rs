//! Telemetry client for CyberSensei nodes
//!
//! The host application feeds [`TelemetryCounters`] (active users,
//! completed exercises, AI latencies); [`TelemetryClient`] turns them into
//! a [`TelemetrySample`] and pushes it to `POST {central}/telemetry`, once on
//! demand or on a fixed schedule. Pushes are best effort: a failed one is
//! logged and dropped, never retried or queued.

pub mod client;
pub mod counters;
pub mod error;
pub mod models;
pub mod probe;
pub mod rollover;

pub use client::{TelemetryClient, TelemetrySettings};
pub use counters::TelemetryCounters;
pub use error::{Result, TelemetryError};
pub use models::{AdditionalData, TelemetrySample, TelemetryStatus};
pub use probe::{ResourceProbe, ResourceSnapshot, StaticProbe, SysinfoProbe};
pub use rollover::{duration_until_next_midnight, run_daily_rollover};
