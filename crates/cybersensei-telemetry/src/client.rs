//! Telemetry client: sample collection, push, and the periodic schedule

use std::sync::Arc;
use std::time::{Duration, Instant};

use cybersensei_http::{join_url, HttpClientTrait, StatusCode};
use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    counters::TelemetryCounters,
    error::{Result, TelemetryError},
    models::{AdditionalData, TelemetrySample, TelemetryStatus},
    probe::{ResourceProbe, ResourceSnapshot, SysinfoProbe},
};

/// Identity the client reports under
#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    pub central_url: String,
    pub tenant_id: String,
    pub version: String,
}

struct Inner {
    http: Arc<dyn HttpClientTrait>,
    endpoint: String,
    tenant_id: String,
    version: String,
    counters: TelemetryCounters,
    probe: Arc<dyn ResourceProbe>,
    started_at: Instant,
    /// Held for the duration of one send
    send_gate: tokio::sync::Mutex<()>,
    /// `Some` while the periodic task runs
    schedule: Mutex<Option<CancellationToken>>,
}

/// Best-effort telemetry push to the Central service.
///
/// Cheap to clone; clones share counters and schedule.
#[derive(Clone)]
pub struct TelemetryClient {
    inner: Arc<Inner>,
}

impl TelemetryClient {
    /// Create a client probing the host with `sysinfo`
    pub fn new(http: Arc<dyn HttpClientTrait>, settings: TelemetrySettings) -> Self {
        Self::with_probe(http, settings, Arc::new(SysinfoProbe::new()))
    }

    /// Create a client with a custom resource probe
    pub fn with_probe(
        http: Arc<dyn HttpClientTrait>,
        settings: TelemetrySettings,
        probe: Arc<dyn ResourceProbe>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                endpoint: join_url(&settings.central_url, "/telemetry"),
                tenant_id: settings.tenant_id,
                version: settings.version,
                counters: TelemetryCounters::new(),
                probe,
                started_at: Instant::now(),
                send_gate: tokio::sync::Mutex::new(()),
                schedule: Mutex::new(None),
            }),
        }
    }

    /// Counters the host application feeds
    pub fn counters(&self) -> &TelemetryCounters {
        &self.inner.counters
    }

    /// Seconds since this client was created
    pub fn uptime_seconds(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }

    /// Build a sample from the current counters. Empties the latency window.
    ///
    /// Host readings touch every mounted filesystem, so they are taken on the
    /// blocking pool.
    pub async fn collect_metrics(&self) -> TelemetrySample {
        let probe = Arc::clone(&self.inner.probe);
        let snapshot = match tokio::task::spawn_blocking(move || probe.snapshot()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Resource snapshot failed, sending counters only");
                ResourceSnapshot {
                    platform: std::env::consts::OS.to_string(),
                    arch: std::env::consts::ARCH.to_string(),
                    ..Default::default()
                }
            }
        };
        let counters = &self.inner.counters;

        TelemetrySample {
            tenant_id: self.inner.tenant_id.clone(),
            uptime_seconds: self.uptime_seconds(),
            active_users: counters.active_users(),
            exercises_completed_today: counters.exercises_completed(),
            ai_latency_ms_avg: counters.take_average_latency(),
            version: self.inner.version.clone(),
            additional_data: AdditionalData::from_snapshot(snapshot),
        }
    }

    /// Collect and push one sample. `true` only when Central answered
    /// `201 Created`; every failure is logged and swallowed.
    ///
    /// Waits for a send already in flight to finish first.
    pub async fn send_telemetry(&self) -> bool {
        let _gate = self.inner.send_gate.lock().await;
        self.send_locked().await
    }

    async fn send_locked(&self) -> bool {
        match self.try_send().await {
            Ok(sample) => {
                info!(
                    active_users = sample.active_users,
                    exercises = sample.exercises_completed_today,
                    ai_latency_ms = ?sample.ai_latency_ms_avg,
                    "Telemetry sent"
                );
                true
            }
            Err(TelemetryError::Network(message)) => {
                error!(error = %message, "Telemetry not sent: Central unreachable");
                false
            }
            Err(e) => {
                error!(error = %e, "Telemetry rejected");
                false
            }
        }
    }

    async fn try_send(&self) -> Result<TelemetrySample> {
        let sample = self.collect_metrics().await;
        let body = serde_json::to_value(&sample)?;

        let response = self.inner.http.post_json(&self.inner.endpoint, &body).await?;
        let status = response.status();
        if status != StatusCode::CREATED {
            warn!(status = status.as_u16(), "Unexpected telemetry status");
            return Err(TelemetryError::UnexpectedStatus(status.as_u16()));
        }

        Ok(sample)
    }

    /// Send from the schedule, skipping the tick if a send is in flight
    async fn scheduled_send(&self) -> bool {
        match self.inner.send_gate.try_lock() {
            Ok(_gate) => self.send_locked().await,
            Err(_) => {
                debug!("Previous telemetry send still in flight, skipping tick");
                false
            }
        }
    }

    /// Send now, then every `interval`.
    ///
    /// Returns `false` without doing anything when already running, when
    /// `interval` is zero, or outside a Tokio runtime.
    pub fn start(&self, interval: Duration) -> bool {
        let mut schedule = self.inner.schedule.lock();
        if schedule.is_some() {
            warn!("Telemetry already running");
            return false;
        }
        if interval.is_zero() {
            warn!("Telemetry interval must be positive");
            return false;
        }
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "Telemetry needs a Tokio runtime to start");
                return false;
            }
        };

        info!(
            endpoint = %self.inner.endpoint,
            tenant_id = %self.inner.tenant_id,
            version = %self.inner.version,
            interval_secs = interval.as_secs_f64(),
            "Starting telemetry"
        );

        let cancel = CancellationToken::new();
        *schedule = Some(cancel.clone());

        let client = self.clone();
        handle.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        client.scheduled_send().await;
                    }
                }
            }
            debug!("Telemetry schedule finished");
        });

        true
    }

    /// Stop the schedule. A send already in flight is allowed to finish.
    pub fn stop(&self) {
        if let Some(cancel) = self.inner.schedule.lock().take() {
            cancel.cancel();
            info!("Telemetry stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.schedule.lock().is_some()
    }

    /// One last send before shutdown
    pub async fn send_final_report(&self) -> bool {
        info!("Sending final telemetry report");
        self.send_telemetry().await
    }

    /// Zero today's exercise count and return what it was
    pub fn reset_daily_counters(&self) -> u64 {
        let previous = self.inner.counters.reset_exercises();
        info!(exercises_completed = previous, "Daily counters reset");
        previous
    }

    pub fn status(&self) -> TelemetryStatus {
        TelemetryStatus {
            is_running: self.is_running(),
            active_users: self.inner.counters.active_users(),
            exercises_completed: self.inner.counters.exercises_completed(),
            uptime_seconds: self.uptime_seconds(),
        }
    }
}
