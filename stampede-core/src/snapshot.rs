//! Per-second window statistics snapshot

use serde::{Deserialize, Serialize};

use crate::health::HealthStatus;

/// Statistics for one 1-second window of a running test
///
/// A snapshot covers only the requests whose completion fell inside its
/// window: the collector drains its counters when the snapshot is taken, so
/// summing `requests_per_second` across snapshots reproduces the run total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    pub test_id: String,
    /// Wall-clock time the snapshot was taken, epoch milliseconds
    pub timestamp_ms: i64,
    /// Virtual users active when the snapshot was taken
    pub active_users: u32,
    /// Requests completed in this window
    pub requests_per_second: u64,
    pub success_count: u64,
    pub error_count: u64,
    /// Failed / total for this window, 0.0 when the window is empty
    pub error_rate: f64,
    pub avg_latency_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub health: HealthStatus,
}

impl WindowSnapshot {
    /// An empty window for a test, classified HEALTHY by the sample floor
    pub fn empty(test_id: impl Into<String>, timestamp_ms: i64, active_users: u32) -> Self {
        WindowSnapshot {
            test_id: test_id.into(),
            timestamp_ms,
            active_users,
            requests_per_second: 0,
            success_count: 0,
            error_count: 0,
            error_rate: 0.0,
            avg_latency_ms: 0.0,
            min_latency_ms: 0.0,
            max_latency_ms: 0.0,
            p50_latency_ms: 0.0,
            p95_latency_ms: 0.0,
            p99_latency_ms: 0.0,
            health: HealthStatus::Healthy,
        }
    }

    /// Throughput per active user, used by saturation analysis
    pub fn tps_per_user(&self) -> f64 {
        if self.active_users == 0 {
            return 0.0;
        }
        self.requests_per_second as f64 / self.active_users as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_window_is_healthy() {
        let snap = WindowSnapshot::empty("t-1", 1_700_000_000_000, 5);
        assert_eq!(snap.requests_per_second, 0);
        assert_eq!(snap.health, HealthStatus::Healthy);
        assert_eq!(snap.tps_per_user(), 0.0);
    }

    #[test]
    fn tps_per_user_divides_by_active_users() {
        let mut snap = WindowSnapshot::empty("t-1", 0, 50);
        snap.requests_per_second = 100;
        assert_eq!(snap.tps_per_user(), 2.0);
    }
}
