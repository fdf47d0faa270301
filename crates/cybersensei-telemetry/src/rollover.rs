//! Midnight reset of the daily exercise counter
//!
//! The client never schedules this on its own; the host spawns
//! [`run_daily_rollover`] next to the telemetry schedule if it wants it.

use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::TelemetryClient;

const MIN_WAIT: Duration = Duration::from_secs(1);
const FALLBACK_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Time from `now` until the next local midnight in `now`'s time zone
pub fn duration_until_next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Duration {
    let next_midnight = now
        .date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|naive| now.timezone().from_local_datetime(&naive).earliest());

    match next_midnight {
        Some(next) => next
            .signed_duration_since(now.clone())
            .to_std()
            .unwrap_or(MIN_WAIT)
            .max(MIN_WAIT),
        None => FALLBACK_WAIT,
    }
}

/// Reset the daily counters at every local midnight until cancelled
pub async fn run_daily_rollover(client: TelemetryClient, cancel: CancellationToken) {
    loop {
        let wait = duration_until_next_midnight(&Local::now());
        debug!(wait_secs = wait.as_secs(), "Next daily rollover scheduled");

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {
                let previous = client.reset_daily_counters();
                info!(exercises_completed = previous, "Daily rollover");
            }
        }
    }
}
