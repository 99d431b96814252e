//! Concurrency-safe windowed statistics accumulation

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use hdrhistogram::Histogram;
use parking_lot::Mutex;

use stampede_core::{HealthStatus, WindowSnapshot};

/// Histogram range: 1 microsecond up to 1 hour, 3 significant digits
const HISTOGRAM_MAX_MICROS: u64 = 3_600_000_000;
const HISTOGRAM_SIGFIGS: u8 = 3;

fn new_histogram() -> Histogram<u64> {
    Histogram::new_with_bounds(1, HISTOGRAM_MAX_MICROS, HISTOGRAM_SIGFIGS)
        .expect("static histogram bounds")
}

/// Accumulates request outcomes into the current 1-second window
///
/// Counters are plain atomics and the latency histogram sits behind a mutex
/// with record-one-value critical sections, so many worker tasks can feed it
/// concurrently. [`snapshot_and_reset`] drains everything in one pass: a
/// `record` racing the drain lands in one window or the other, never both
/// and never neither.
///
/// [`snapshot_and_reset`]: WindowedStatsCollector::snapshot_and_reset
#[derive(Debug)]
pub struct WindowedStatsCollector {
    test_id: String,
    total_requests: AtomicU64,
    success_requests: AtomicU64,
    failed_requests: AtomicU64,
    latency_sum_ms: AtomicU64,
    min_latency_ms: AtomicU64,
    max_latency_ms: AtomicU64,
    histogram: Mutex<Histogram<u64>>,
}

impl WindowedStatsCollector {
    pub fn new(test_id: impl Into<String>) -> Self {
        Self {
            test_id: test_id.into(),
            total_requests: AtomicU64::new(0),
            success_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            latency_sum_ms: AtomicU64::new(0),
            min_latency_ms: AtomicU64::new(u64::MAX),
            max_latency_ms: AtomicU64::new(0),
            histogram: Mutex::new(new_histogram()),
        }
    }

    pub fn test_id(&self) -> &str {
        &self.test_id
    }

    /// Record one request outcome into the current window.
    ///
    /// Latencies beyond the histogram range still count toward the totals;
    /// only their percentile contribution is dropped.
    pub fn record(&self, latency: Duration, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.success_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }

        let millis = latency.as_millis() as u64;
        self.latency_sum_ms.fetch_add(millis, Ordering::Relaxed);
        self.min_latency_ms.fetch_min(millis, Ordering::Relaxed);
        self.max_latency_ms.fetch_max(millis, Ordering::Relaxed);

        let micros = (latency.as_micros() as u64).max(1);
        let _ = self.histogram.lock().record(micros);
    }

    /// Drain the current window into a snapshot and start a fresh one.
    pub fn snapshot_and_reset(&self, active_users: u32) -> WindowSnapshot {
        let total = self.total_requests.swap(0, Ordering::Relaxed);
        let success = self.success_requests.swap(0, Ordering::Relaxed);
        let failed = self.failed_requests.swap(0, Ordering::Relaxed);
        let latency_sum = self.latency_sum_ms.swap(0, Ordering::Relaxed);
        let min = self.min_latency_ms.swap(u64::MAX, Ordering::Relaxed);
        let max = self.max_latency_ms.swap(0, Ordering::Relaxed);

        let drained = {
            let mut guard = self.histogram.lock();
            std::mem::replace(&mut *guard, new_histogram())
        };

        self.build_snapshot(active_users, total, success, failed, latency_sum, min, max, &drained)
    }

    /// Read the current window without draining it.
    ///
    /// Used only for the best-effort final report at stop time.
    pub fn current_snapshot(&self, active_users: u32) -> WindowSnapshot {
        let total = self.total_requests.load(Ordering::Relaxed);
        let success = self.success_requests.load(Ordering::Relaxed);
        let failed = self.failed_requests.load(Ordering::Relaxed);
        let latency_sum = self.latency_sum_ms.load(Ordering::Relaxed);
        let min = self.min_latency_ms.load(Ordering::Relaxed);
        let max = self.max_latency_ms.load(Ordering::Relaxed);

        let guard = self.histogram.lock();
        self.build_snapshot(active_users, total, success, failed, latency_sum, min, max, &guard)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_snapshot(
        &self,
        active_users: u32,
        total: u64,
        success: u64,
        failed: u64,
        latency_sum_ms: u64,
        min_ms: u64,
        max_ms: u64,
        histogram: &Histogram<u64>,
    ) -> WindowSnapshot {
        let avg_latency_ms = if total > 0 {
            latency_sum_ms as f64 / total as f64
        } else {
            0.0
        };
        let error_rate = if total > 0 {
            failed as f64 / total as f64
        } else {
            0.0
        };

        let percentile = |q: f64| -> f64 {
            if histogram.is_empty() {
                0.0
            } else {
                histogram.value_at_quantile(q) as f64 / 1000.0
            }
        };

        WindowSnapshot {
            test_id: self.test_id.clone(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            active_users,
            requests_per_second: total,
            success_count: success,
            error_count: failed,
            error_rate,
            avg_latency_ms,
            min_latency_ms: if min_ms == u64::MAX { 0.0 } else { min_ms as f64 },
            max_latency_ms: max_ms as f64,
            p50_latency_ms: percentile(0.50),
            p95_latency_ms: percentile(0.95),
            p99_latency_ms: percentile(0.99),
            health: HealthStatus::classify(avg_latency_ms, error_rate, total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn window_is_drained_by_snapshot() {
        let collector = WindowedStatsCollector::new("t-1");
        collector.record(ms(100), true);
        collector.record(ms(300), false);

        let snap = collector.snapshot_and_reset(2);
        assert_eq!(snap.requests_per_second, 2);
        assert_eq!(snap.success_count, 1);
        assert_eq!(snap.error_count, 1);
        assert_eq!(snap.error_rate, 0.5);
        assert_eq!(snap.avg_latency_ms, 200.0);
        assert_eq!(snap.min_latency_ms, 100.0);
        assert_eq!(snap.max_latency_ms, 300.0);
        assert_eq!(snap.active_users, 2);

        // Next window starts empty
        let empty = collector.snapshot_and_reset(2);
        assert_eq!(empty.requests_per_second, 0);
        assert_eq!(empty.avg_latency_ms, 0.0);
        assert_eq!(empty.min_latency_ms, 0.0);
        assert_eq!(empty.health, HealthStatus::Healthy);
    }

    #[test]
    fn percentiles_come_from_the_window_histogram() {
        let collector = WindowedStatsCollector::new("t-1");
        for v in 1..=100 {
            collector.record(ms(v), true);
        }

        let snap = collector.snapshot_and_reset(1);
        // 3 significant digits: within 1% of the exact rank
        assert!((snap.p50_latency_ms - 50.0).abs() <= 1.0, "p50={}", snap.p50_latency_ms);
        assert!((snap.p95_latency_ms - 95.0).abs() <= 1.5, "p95={}", snap.p95_latency_ms);
        assert!((snap.p99_latency_ms - 99.0).abs() <= 1.5, "p99={}", snap.p99_latency_ms);
        assert_eq!(snap.avg_latency_ms, 50.5);
    }

    #[test]
    fn out_of_range_latency_counts_without_percentiles() {
        let collector = WindowedStatsCollector::new("t-1");
        collector.record(Duration::from_secs(7200), false);

        let snap = collector.snapshot_and_reset(1);
        assert_eq!(snap.requests_per_second, 1);
        assert_eq!(snap.error_count, 1);
        // The 2h value was dropped from the histogram
        assert_eq!(snap.p99_latency_ms, 0.0);
    }

    #[test]
    fn current_snapshot_does_not_drain() {
        let collector = WindowedStatsCollector::new("t-1");
        collector.record(ms(50), true);

        let peek = collector.current_snapshot(1);
        assert_eq!(peek.requests_per_second, 1);

        let snap = collector.snapshot_and_reset(1);
        assert_eq!(snap.requests_per_second, 1);
    }

    #[test]
    fn concurrent_records_partition_across_windows() {
        let collector = Arc::new(WindowedStatsCollector::new("t-1"));
        let writers = 8;
        let per_writer = 2_000u64;

        let mut observed = 0u64;
        std::thread::scope(|scope| {
            for w in 0..writers {
                let collector = Arc::clone(&collector);
                scope.spawn(move || {
                    for i in 0..per_writer {
                        collector.record(ms(1 + (i + w) % 50), i % 7 != 0);
                    }
                });
            }

            // Snapshot while writers are running
            for _ in 0..20 {
                observed += collector.snapshot_and_reset(writers as u32).requests_per_second;
                std::thread::yield_now();
            }
        });

        // Final drain picks up everything the mid-run snapshots missed
        observed += collector.snapshot_and_reset(0).requests_per_second;
        assert_eq!(observed, writers as u64 * per_writer);
    }
}
