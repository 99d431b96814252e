//! Periodic statistics reporting
//!
//! One task per run, ticking every second for the life of the test. Each
//! tick drains the collector into a window snapshot, runs the injected guard
//! hook, feeds the detectors, and publishes. Stopping hands back the
//! breaking-point summary gathered along the way.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use stampede_core::{BreakingPointInfo, HealthStatus, WindowSnapshot};
use stampede_stats::{BreakingPointTracker, SaturationDetector, WindowedStatsCollector};

use crate::publisher::StatPublisher;
use crate::worker::RunCounters;

const WINDOW_INTERVAL: Duration = Duration::from_secs(1);
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Guard hook invoked with every window snapshot, including idle ones
pub(crate) type WindowGuard = Box<dyn FnMut(&WindowSnapshot) + Send>;

/// Handle to a running reporter task
pub(crate) struct StatsReporter {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<Option<BreakingPointInfo>>,
}

impl StatsReporter {
    /// Spawn the 1 Hz reporting task for a run.
    pub fn spawn(
        collector: Arc<WindowedStatsCollector>,
        publisher: Arc<dyn StatPublisher>,
        counters: Arc<RunCounters>,
        guard: WindowGuard,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(report_loop(collector, publisher, counters, guard, shutdown_rx));
        Self { shutdown_tx, task }
    }

    /// Stop the tick loop and collect the breaking-point summary.
    ///
    /// The task performs one best-effort final publish on its way out; if it
    /// fails to wind down in time it is cancelled and the summary is lost,
    /// which is logged rather than raised.
    pub async fn stop(mut self) -> Option<BreakingPointInfo> {
        let _ = self.shutdown_tx.send(true);
        match tokio::time::timeout(STOP_TIMEOUT, &mut self.task).await {
            Ok(Ok(breaking_point)) => breaking_point,
            Ok(Err(e)) => {
                warn!("stats reporter task failed: {}", e);
                None
            }
            Err(_) => {
                warn!("stats reporter did not stop in time, cancelling");
                self.task.abort();
                None
            }
        }
    }
}

async fn report_loop(
    collector: Arc<WindowedStatsCollector>,
    publisher: Arc<dyn StatPublisher>,
    counters: Arc<RunCounters>,
    mut guard: WindowGuard,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Option<BreakingPointInfo> {
    let mut breaking_point = BreakingPointTracker::new();
    let mut saturation = SaturationDetector::new();
    let mut last_health: Option<HealthStatus> = None;

    let mut interval =
        tokio::time::interval_at(tokio::time::Instant::now() + WINDOW_INTERVAL, WINDOW_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let snapshot = collector.snapshot_and_reset(counters.active_users());

                guard(&snapshot);

                // Idle windows carry no signal worth tracking or shipping
                if snapshot.requests_per_second == 0 {
                    continue;
                }

                log_health_transition(&mut last_health, &snapshot);
                breaking_point.observe(&snapshot);
                saturation.observe(&snapshot);

                match publisher.publish(&snapshot).await {
                    Ok(()) => debug!(
                        test_id = %snapshot.test_id,
                        tps = snapshot.requests_per_second,
                        avg_latency_ms = format_args!("{:.1}", snapshot.avg_latency_ms),
                        errors = snapshot.error_count,
                        status = %snapshot.health,
                        "window snapshot published"
                    ),
                    Err(e) => warn!("failed to publish window snapshot: {}", e),
                }
            }
            _ = shutdown_rx.changed() => break,
        }
    }

    // Best-effort final report from whatever the last partial window holds
    let final_snapshot = collector.current_snapshot(counters.active_users());
    if final_snapshot.requests_per_second > 0 {
        match publisher.publish(&final_snapshot).await {
            Ok(()) => info!(test_id = %final_snapshot.test_id, "final snapshot published"),
            Err(e) => warn!("failed to publish final snapshot: {}", e),
        }
    }

    breaking_point.breaking_point(saturation.is_saturated())
}

fn log_health_transition(last: &mut Option<HealthStatus>, snapshot: &WindowSnapshot) {
    if *last == Some(snapshot.health) {
        return;
    }
    match *last {
        None => info!(
            test_id = %snapshot.test_id,
            status = %snapshot.health,
            users = snapshot.active_users,
            tps = snapshot.requests_per_second,
            "initial health status: {}",
            snapshot.health.description()
        ),
        Some(previous) => warn!(
            test_id = %snapshot.test_id,
            from = %previous,
            to = %snapshot.health,
            users = snapshot.active_users,
            tps = snapshot.requests_per_second,
            avg_latency_ms = format_args!("{:.1}", snapshot.avg_latency_ms),
            error_rate = format_args!("{:.2}%", snapshot.error_rate * 100.0),
            "health status changed: {}",
            snapshot.health.description()
        ),
    }
    *last = Some(snapshot.health);
}
