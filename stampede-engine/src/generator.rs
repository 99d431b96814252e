//! Top-level load test orchestration
//!
//! One engine instance runs one test at a time. All per-run state lives in
//! an `ActiveRun` created by [`LoadEngine::start`] and consumed by
//! [`LoadEngine::stop`]; the engine itself keeps only the request executor,
//! the publish sink, and the run slot. Every protective trigger (SLO guard,
//! circuit breaker, horizon monitor) sends a message on the run's command
//! channel, and a per-run supervisor task performs the actual stop, so no
//! task ever has to tear itself down from inside its own tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use stampede_core::{LoadProfile, TestPlan};
use stampede_http::{PreparedRequest, RequestExecutor};
use stampede_stats::WindowedStatsCollector;

use crate::error::EngineError;
use crate::guard::SloGuard;
use crate::publisher::StatPublisher;
use crate::reporter::StatsReporter;
use crate::scheduler::{
    spawn_immediate, spawn_ramp_up, spawn_spike_phases, spawn_stress_steps, SpawnContext,
};
use crate::worker::{RunCounters, StopReason, WorkerContext};

/// How long stop waits for in-flight requests before cancelling workers
const WORKER_GRACE_PERIOD: Duration = Duration::from_secs(5);
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Cumulative totals for the current run, or the last finished one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub request_count: u64,
    pub error_count: u64,
    pub running: bool,
}

struct ActiveRun {
    test_id: String,
    running: Arc<AtomicBool>,
    counters: Arc<RunCounters>,
    reporter: StatsReporter,
    workers: Arc<parking_lot::Mutex<Vec<JoinHandle<()>>>>,
    controller: Option<JoinHandle<()>>,
    monitor: JoinHandle<()>,
}

struct EngineInner {
    executor: RequestExecutor,
    publisher: Arc<dyn StatPublisher>,
    run: tokio::sync::Mutex<Option<ActiveRun>>,
    last_totals: parking_lot::Mutex<(u64, u64)>,
}

/// The load generation engine
#[derive(Clone)]
pub struct LoadEngine {
    inner: Arc<EngineInner>,
}

impl LoadEngine {
    pub fn new(executor: RequestExecutor, publisher: Arc<dyn StatPublisher>) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                executor,
                publisher,
                run: tokio::sync::Mutex::new(None),
                last_totals: parking_lot::Mutex::new((0, 0)),
            }),
        }
    }

    /// Start a run for the given plan.
    ///
    /// Rejects invalid plans synchronously and refuses to start while a run
    /// is active. On success the run proceeds in the background until its
    /// horizon, a protective stop, or an external [`stop`] ends it.
    ///
    /// [`stop`]: LoadEngine::stop
    pub async fn start(&self, plan: TestPlan) -> Result<(), EngineError> {
        plan.validate()?;
        let prepared = PreparedRequest::from_target(&plan.target)?;

        let mut slot = self.inner.run.lock().await;
        if slot.is_some() {
            warn!("a load test is already running, ignoring start request");
            return Err(EngineError::AlreadyRunning);
        }

        let horizon = Duration::from_secs(plan.profile.total_duration_seconds());
        info!(
            test_id = %plan.test_id,
            kind = plan.profile.kind(),
            url = %plan.target.url,
            method = %plan.target.method,
            horizon_secs = horizon.as_secs(),
            "starting load test"
        );

        let running = Arc::new(AtomicBool::new(true));
        let counters = Arc::new(RunCounters::default());
        let collector = Arc::new(WindowedStatsCollector::new(&plan.test_id));
        let (stop_tx, stop_rx) = mpsc::unbounded_channel();

        let mut slo_guard = SloGuard::new(
            plan.test_id.clone(),
            Arc::clone(&running),
            stop_tx.clone(),
        );
        let reporter = StatsReporter::spawn(
            Arc::clone(&collector),
            Arc::clone(&self.inner.publisher),
            Arc::clone(&counters),
            Box::new(move |snapshot| slo_guard.observe(snapshot)),
        );

        let spawn_ctx = SpawnContext::new(WorkerContext {
            test_id: plan.test_id.clone(),
            executor: self.inner.executor.clone(),
            request: Arc::new(prepared),
            collector,
            counters: Arc::clone(&counters),
            running: Arc::clone(&running),
            stop_tx: stop_tx.clone(),
        });
        let workers = Arc::clone(&spawn_ctx.workers);
        let test_end = Instant::now() + horizon;

        let controller = match plan.profile {
            LoadProfile::Load {
                virtual_users,
                duration_seconds,
                ramp_up_seconds,
            }
            | LoadProfile::Soak {
                virtual_users,
                duration_seconds,
                ramp_up_seconds,
            } => {
                let duration = Duration::from_secs(duration_seconds);
                if ramp_up_seconds > 0 {
                    Some(spawn_ramp_up(
                        spawn_ctx,
                        virtual_users,
                        duration,
                        Duration::from_secs(ramp_up_seconds),
                    ))
                } else {
                    spawn_immediate(&spawn_ctx, virtual_users, test_end);
                    None
                }
            }
            LoadProfile::Stress {
                start_users,
                max_users,
                step_duration_seconds,
                step_increment,
            } => Some(spawn_stress_steps(
                spawn_ctx,
                start_users,
                max_users,
                Duration::from_secs(step_duration_seconds),
                step_increment,
                plan.profile.total_steps().unwrap_or(1),
                test_end,
            )),
            LoadProfile::Spike {
                base_users,
                spike_users,
                spike_duration_seconds,
                recovery_duration_seconds,
            } => Some(spawn_spike_phases(
                spawn_ctx,
                base_users,
                spike_users,
                Duration::from_secs(spike_duration_seconds),
                Duration::from_secs(recovery_duration_seconds),
                test_end,
            )),
        };

        let monitor = spawn_monitor(
            plan.test_id.clone(),
            Arc::clone(&counters),
            Arc::clone(&running),
            stop_tx,
            horizon,
        );

        // Supervisor: the one place protective stops are acted on
        let engine = self.clone();
        tokio::spawn(async move {
            let mut stop_rx = stop_rx;
            while let Some(reason) = stop_rx.recv().await {
                warn!(%reason, "protective stop requested");
                engine.stop().await;
            }
        });

        *slot = Some(ActiveRun {
            test_id: plan.test_id,
            running,
            counters,
            reporter,
            workers,
            controller,
            monitor,
        });
        Ok(())
    }

    /// Stop the active run, if any.
    ///
    /// Idempotent and safe to call from any number of triggers concurrently:
    /// the run slot is taken under the lock, so exactly one caller does the
    /// teardown. Returns whether a run was actually stopped.
    pub async fn stop(&self) -> bool {
        let mut slot = self.inner.run.lock().await;
        let Some(run) = slot.take() else {
            warn!("no load test is running, ignoring stop request");
            return false;
        };

        info!(test_id = %run.test_id, "stopping load test");
        run.running.store(false, Ordering::SeqCst);

        // Capture the breaking point before the reporter is gone
        let breaking_point = run.reporter.stop().await;

        // Let in-flight requests drain, then cancel whatever is left
        let deadline = Instant::now() + WORKER_GRACE_PERIOD;
        while run.counters.active_users() > 0 && Instant::now() < deadline {
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
        let remaining = run.counters.active_users();
        if remaining > 0 {
            warn!(remaining, "grace period elapsed, cancelling remaining workers");
        }
        for handle in run.workers.lock().drain(..) {
            handle.abort();
        }
        if let Some(controller) = run.controller {
            controller.abort();
        }
        run.monitor.abort();

        let requests = run.counters.requests.load(Ordering::Relaxed);
        let errors = run.counters.errors.load(Ordering::Relaxed);
        *self.inner.last_totals.lock() = (requests, errors);

        info!(
            test_id = %run.test_id,
            total_requests = requests,
            total_errors = errors,
            "load test finished"
        );
        match breaking_point {
            Some(bp) => warn!(test_id = %run.test_id, breaking_point = %bp, "breaking point detected during this run"),
            None => info!(test_id = %run.test_id, "no breaking point detected, the target absorbed the load"),
        }
        true
    }

    /// Whether a run is currently active
    pub async fn is_running(&self) -> bool {
        self.inner.run.lock().await.is_some()
    }

    /// Totals for the active run, or the last finished one
    pub async fn stats(&self) -> EngineStats {
        let slot = self.inner.run.lock().await;
        match slot.as_ref() {
            Some(run) => EngineStats {
                request_count: run.counters.requests.load(Ordering::Relaxed),
                error_count: run.counters.errors.load(Ordering::Relaxed),
                running: true,
            },
            None => {
                let (request_count, error_count) = *self.inner.last_totals.lock();
                EngineStats {
                    request_count,
                    error_count,
                    running: false,
                }
            }
        }
    }
}

/// 1 Hz progress log plus horizon enforcement.
///
/// Guarantees the run terminates even when no protective guard ever fires.
fn spawn_monitor(
    test_id: String,
    counters: Arc<RunCounters>,
    running: Arc<AtomicBool>,
    stop_tx: mpsc::UnboundedSender<StopReason>,
    horizon: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let end = Instant::now() + horizon;
        let mut last_requests: u64 = 0;
        let mut last_tick = Instant::now();
        let tick = Duration::from_secs(1);
        let mut interval = tokio::time::interval_at(Instant::now() + tick, tick);

        loop {
            interval.tick().await;
            if !running.load(Ordering::SeqCst) {
                return;
            }

            let now = Instant::now();
            let requests = counters.requests.load(Ordering::Relaxed);
            let errors = counters.errors.load(Ordering::Relaxed);
            let elapsed = now.duration_since(last_tick).as_secs_f64();
            if elapsed > 0.0 {
                let tps = (requests - last_requests) as f64 / elapsed;
                let error_rate = if requests > 0 {
                    errors as f64 / requests as f64 * 100.0
                } else {
                    0.0
                };
                info!(
                    test_id = %test_id,
                    total_requests = requests,
                    total_errors = errors,
                    active_users = counters.active_users(),
                    tps = format_args!("{:.2}", tps),
                    error_rate = format_args!("{:.2}%", error_rate),
                    "load test progress"
                );
            }
            last_requests = requests;
            last_tick = now;

            if now >= end {
                break;
            }
        }

        if running.load(Ordering::SeqCst) {
            info!(test_id = %test_id, "test horizon reached, requesting stop");
            let _ = stop_tx.send(StopReason::HorizonReached);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::NoopPublisher;
    use std::collections::HashMap;
    use stampede_core::TargetSpec;

    fn engine() -> LoadEngine {
        LoadEngine::new(RequestExecutor::new().unwrap(), Arc::new(NoopPublisher))
    }

    fn plan(url: &str, profile: LoadProfile) -> TestPlan {
        TestPlan {
            test_id: "t-gen".to_string(),
            target: TargetSpec {
                url: url.to_string(),
                method: "GET".to_string(),
                headers: HashMap::new(),
                query_params: HashMap::new(),
                body: None,
            },
            profile,
        }
    }

    #[tokio::test]
    async fn stop_without_a_run_is_a_no_op() {
        let engine = engine();
        assert!(!engine.stop().await);
        assert!(!engine.stop().await);
        assert_eq!(engine.stats().await, EngineStats::default());
    }

    #[tokio::test]
    async fn second_start_is_rejected_while_running() {
        let engine = engine();
        let profile = LoadProfile::Load {
            virtual_users: 1,
            duration_seconds: 60,
            ramp_up_seconds: 0,
        };
        // Discard port: requests fail fast but the run stays alive
        engine
            .start(plan("http://127.0.0.1:9/", profile))
            .await
            .unwrap();
        assert!(engine.is_running().await);

        let err = engine
            .start(plan("http://127.0.0.1:9/", profile))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::AlreadyRunning));

        assert!(engine.stop().await);
        assert!(!engine.is_running().await);
        assert!(!engine.stop().await);
    }

    #[tokio::test]
    async fn invalid_plan_is_rejected_without_state_change() {
        let engine = engine();
        let err = engine
            .start(plan(
                "ftp://files.example.com/",
                LoadProfile::Load {
                    virtual_users: 1,
                    duration_seconds: 10,
                    ramp_up_seconds: 0,
                },
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidPlan(_)));
        assert!(!engine.is_running().await);
    }

    #[tokio::test]
    async fn stats_survive_the_run() {
        let engine = engine();
        engine
            .start(plan(
                "http://127.0.0.1:9/",
                LoadProfile::Load {
                    virtual_users: 2,
                    duration_seconds: 60,
                    ramp_up_seconds: 0,
                },
            ))
            .await
            .unwrap();

        // Workers burn through their consecutive-failure budget quickly
        tokio::time::sleep(Duration::from_millis(600)).await;
        engine.stop().await;

        let stats = engine.stats().await;
        assert!(!stats.running);
        assert!(stats.request_count > 0);
        assert_eq!(stats.request_count, stats.error_count);
    }
}
