//! The per-user request loop shared by every discipline

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{error, warn};

use stampede_http::{PreparedRequest, RequestExecutor};
use stampede_stats::WindowedStatsCollector;

/// Pause between iterations of one virtual user
pub(crate) const PACING_INTERVAL: Duration = Duration::from_millis(10);

/// Consecutive failures after which a single worker gives up
pub(crate) const MAX_CONSECUTIVE_FAILURES: u32 = 10;

/// The global circuit breaker needs this many requests before it judges
pub(crate) const CIRCUIT_BREAKER_MIN_REQUESTS: u64 = 100;
/// Run-wide error rate at which the whole test is stopped
pub(crate) const CIRCUIT_BREAKER_ERROR_RATE: f64 = 0.80;

/// Why a protective stop was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopReason {
    /// Average latency stayed over the SLO for consecutive windows
    SloViolation,
    /// Run-wide error rate crossed the circuit breaker threshold
    ErrorRateExceeded,
    /// The discipline's total horizon elapsed
    HorizonReached,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::SloViolation => write!(f, "latency SLO violated"),
            StopReason::ErrorRateExceeded => write!(f, "error rate exceeded"),
            StopReason::HorizonReached => write!(f, "test horizon reached"),
        }
    }
}

/// Cumulative counters for one run, shared by workers, monitor and reporter
#[derive(Debug, Default)]
pub(crate) struct RunCounters {
    pub requests: AtomicU64,
    pub errors: AtomicU64,
    pub active_users: AtomicU64,
}

impl RunCounters {
    pub fn active_users(&self) -> u32 {
        self.active_users.load(Ordering::Relaxed) as u32
    }
}

/// Everything one virtual user needs; cheap to clone per spawn
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub test_id: String,
    pub executor: RequestExecutor,
    pub request: Arc<PreparedRequest>,
    pub collector: Arc<WindowedStatsCollector>,
    pub counters: Arc<RunCounters>,
    pub running: Arc<AtomicBool>,
    pub stop_tx: mpsc::UnboundedSender<StopReason>,
}

/// Whether the run-wide circuit breaker should trip
pub(crate) fn error_rate_exceeded(total_requests: u64, total_errors: u64) -> bool {
    total_requests >= CIRCUIT_BREAKER_MIN_REQUESTS
        && total_errors as f64 / total_requests as f64 >= CIRCUIT_BREAKER_ERROR_RATE
}

/// Keeps the active-user gauge honest on every exit path, aborts included
struct ActiveUserGuard {
    counters: Arc<RunCounters>,
}

impl ActiveUserGuard {
    fn enter(counters: &Arc<RunCounters>) -> Self {
        counters.active_users.fetch_add(1, Ordering::Relaxed);
        Self {
            counters: Arc::clone(counters),
        }
    }
}

impl Drop for ActiveUserGuard {
    fn drop(&mut self) {
        self.counters.active_users.fetch_sub(1, Ordering::Relaxed);
    }
}

/// One virtual user: request, record, pace, repeat until the end time or the
/// running flag says otherwise.
///
/// The flag is polled at the loop boundary only, so a stop lets the in-flight
/// request finish but issues no new ones.
pub(crate) async fn run_virtual_user(ctx: WorkerContext, user_index: u32, end_time: Instant) {
    let _active = ActiveUserGuard::enter(&ctx.counters);
    let mut consecutive_failures: u32 = 0;

    while Instant::now() < end_time && ctx.running.load(Ordering::SeqCst) {
        let outcome = ctx.executor.execute(&ctx.request).await;
        ctx.collector.record(outcome.latency, outcome.success);
        ctx.counters.requests.fetch_add(1, Ordering::Relaxed);

        if outcome.success {
            consecutive_failures = 0;
        } else {
            ctx.counters.errors.fetch_add(1, Ordering::Relaxed);
            consecutive_failures += 1;

            if consecutive_failures <= 3 {
                warn!(
                    test_id = %ctx.test_id,
                    user = user_index,
                    status = ?outcome.status,
                    latency_ms = outcome.latency.as_millis() as u64,
                    "request failed ({}/{})",
                    consecutive_failures,
                    MAX_CONSECUTIVE_FAILURES
                );
            }

            if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                error!(
                    test_id = %ctx.test_id,
                    user = user_index,
                    "too many consecutive failures, stopping this virtual user"
                );
                break;
            }

            let total = ctx.counters.requests.load(Ordering::Relaxed);
            let errors = ctx.counters.errors.load(Ordering::Relaxed);
            if error_rate_exceeded(total, errors) {
                // First worker to observe the breach clears the flag;
                // everyone else just sees the flag and winds down.
                if ctx.running.swap(false, Ordering::SeqCst) {
                    error!(
                        test_id = %ctx.test_id,
                        total_requests = total,
                        error_rate = format_args!("{:.2}%", errors as f64 / total as f64 * 100.0),
                        "run-wide error rate too high, the target may be down; stopping all users"
                    );
                    let _ = ctx.stop_tx.send(StopReason::ErrorRateExceeded);
                }
                break;
            }
        }

        tokio::time::sleep(PACING_INTERVAL).await;
    }
}
