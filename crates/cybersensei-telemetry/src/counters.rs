//! Process-local usage counters
//!
//! Nothing here is persisted: a restart starts every counter from zero.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

#[derive(Debug, Default)]
struct LatencyWindow {
    sum_ms: f64,
    count: u64,
}

/// Counters fed by the host application and drained by telemetry samples
#[derive(Debug, Default)]
pub struct TelemetryCounters {
    active_users: AtomicU64,
    exercises_completed: AtomicU64,
    latency: Mutex<LatencyWindow>,
}

impl TelemetryCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// A user became active
    pub fn register_active_user(&self) {
        self.active_users.fetch_add(1, Ordering::Relaxed);
    }

    /// A user went away. Never drops below zero.
    pub fn unregister_active_user(&self) {
        let _ = self
            .active_users
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn active_users(&self) -> u64 {
        self.active_users.load(Ordering::Relaxed)
    }

    /// Add `count` completed exercises to today's total
    pub fn increment_exercises(&self, count: u64) {
        self.exercises_completed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn exercises_completed(&self) -> u64 {
        self.exercises_completed.load(Ordering::Relaxed)
    }

    /// Zero today's exercise count, returning what it was
    pub fn reset_exercises(&self) -> u64 {
        self.exercises_completed.swap(0, Ordering::Relaxed)
    }

    /// Record one AI response latency. Negative or non-finite values are
    /// ignored.
    pub fn record_ai_latency(&self, latency_ms: f64) {
        if !latency_ms.is_finite() || latency_ms < 0.0 {
            return;
        }
        let mut window = self.latency.lock();
        window.sum_ms += latency_ms;
        window.count += 1;
    }

    /// Average latency since the previous call, rounded to two decimals,
    /// or `None` when nothing was recorded. Always empties the window.
    pub fn take_average_latency(&self) -> Option<f64> {
        let window = std::mem::take(&mut *self.latency.lock());
        if window.count == 0 {
            return None;
        }
        let average = window.sum_ms / window.count as f64;
        Some((average * 100.0).round() / 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_average_latency_rounds_and_resets() {
        let counters = TelemetryCounters::new();
        counters.record_ai_latency(100.0);
        counters.record_ai_latency(200.0);
        counters.record_ai_latency(100.5);

        assert_eq!(counters.take_average_latency(), Some(133.5));
        assert_eq!(counters.take_average_latency(), None);
    }

    #[test]
    fn test_average_latency_two_decimals() {
        let counters = TelemetryCounters::new();
        counters.record_ai_latency(1.0);
        counters.record_ai_latency(1.0);
        counters.record_ai_latency(2.0);

        assert_eq!(counters.take_average_latency(), Some(1.33));
    }

    #[test]
    fn test_invalid_latency_ignored() {
        let counters = TelemetryCounters::new();
        counters.record_ai_latency(f64::NAN);
        counters.record_ai_latency(-5.0);
        assert_eq!(counters.take_average_latency(), None);
    }

    #[test]
    fn test_reset_exercises_returns_previous() {
        let counters = TelemetryCounters::new();
        counters.increment_exercises(3);
        counters.increment_exercises(1);

        assert_eq!(counters.reset_exercises(), 4);
        assert_eq!(counters.exercises_completed(), 0);
    }

    #[test]
    fn test_unregister_floors_at_zero() {
        let counters = TelemetryCounters::new();
        counters.unregister_active_user();
        assert_eq!(counters.active_users(), 0);

        counters.register_active_user();
        counters.unregister_active_user();
        counters.unregister_active_user();
        assert_eq!(counters.active_users(), 0);
    }

    proptest! {
        #[test]
        fn prop_active_users_never_negative(ops in proptest::collection::vec(any::<bool>(), 0..200)) {
            let counters = TelemetryCounters::new();
            let mut expected: u64 = 0;

            for register in ops {
                if register {
                    counters.register_active_user();
                    expected += 1;
                } else {
                    counters.unregister_active_user();
                    expected = expected.saturating_sub(1);
                }
                prop_assert_eq!(counters.active_users(), expected);
            }
        }
    }
}
