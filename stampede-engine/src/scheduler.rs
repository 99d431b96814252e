//! Per-discipline virtual user scheduling
//!
//! Each discipline gets a controller task that decides when users start;
//! every spawned user runs the same request loop from `worker`. Controllers
//! check the running flag before each spawn, so a protective stop mid-phase
//! halts further growth without touching users already in flight.

use std::sync::atomic::Ordering;
use std::time::Duration;

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::worker::{run_virtual_user, WorkerContext};

/// Shared spawning state for one run
#[derive(Clone)]
pub(crate) struct SpawnContext {
    pub worker: WorkerContext,
    /// Handles for every spawned user, drained at stop time
    pub workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl SpawnContext {
    pub fn new(worker: WorkerContext) -> Self {
        Self {
            worker,
            workers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn running(&self) -> bool {
        self.worker.running.load(Ordering::SeqCst)
    }

    fn spawn_user(&self, user_index: u32, end_time: Instant) {
        let handle = tokio::spawn(run_virtual_user(self.worker.clone(), user_index, end_time));
        self.workers.lock().push(handle);
    }
}

/// Start every user immediately against a shared end time.
pub(crate) fn spawn_immediate(ctx: &SpawnContext, virtual_users: u32, end_time: Instant) {
    for user_index in 0..virtual_users {
        ctx.spawn_user(user_index, end_time);
    }
    info!("{} virtual users started immediately", virtual_users);
}

/// Ramp users up over `ramp_up`, spreading spawns evenly.
///
/// Each ramped user runs for the full `duration` from its own start; the
/// run-level horizon still cuts everyone off together.
pub(crate) fn spawn_ramp_up(
    ctx: SpawnContext,
    virtual_users: u32,
    duration: Duration,
    ramp_up: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let delay = ramp_up.div_f64(f64::from(virtual_users));
        info!(
            users = virtual_users,
            ramp_up_secs = ramp_up.as_secs(),
            "ramp-up started"
        );

        for user_index in 0..virtual_users {
            if !ctx.running() {
                warn!(
                    spawned = user_index,
                    "run stopped mid-ramp, halting further spawns"
                );
                return;
            }
            ctx.spawn_user(user_index, Instant::now() + duration);
            if user_index < virtual_users - 1 {
                tokio::time::sleep(delay).await;
            }
        }

        info!("ramp-up complete, all {} virtual users started", virtual_users);
    })
}

/// Stepped stress schedule: start with `start_users`, add `step_increment`
/// each step until the cumulative count would exceed `max_users`.
///
/// Users are only ever added. Every user shares the run-wide end time, so
/// late joiners run shorter wall-clock spans and everyone stops together.
pub(crate) fn spawn_stress_steps(
    ctx: SpawnContext,
    start_users: u32,
    max_users: u32,
    step_duration: Duration,
    step_increment: u32,
    total_steps: u64,
    test_end: Instant,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut step: u64 = 0;
        let mut current_users = start_users;
        let mut spawned: u32 = 0;

        while current_users <= max_users && ctx.running() {
            let step_started = Instant::now();
            let users_to_start = if step == 0 { start_users } else { step_increment };

            info!(
                step = step + 1,
                total_steps,
                adding = users_to_start,
                target_users = current_users,
                "stress step starting"
            );

            for _ in 0..users_to_start {
                if !ctx.running() {
                    warn!(spawned, "run stopped mid-step, halting further spawns");
                    return;
                }
                ctx.spawn_user(spawned, test_end);
                spawned += 1;
            }

            let remaining = step_duration.saturating_sub(step_started.elapsed());
            if !remaining.is_zero() {
                tokio::time::sleep(remaining).await;
            }

            info!(
                step = step + 1,
                active_users = ctx.worker.counters.active_users(),
                "stress step complete"
            );

            step += 1;
            current_users += step_increment;
        }

        info!(
            max_users,
            active_users = ctx.worker.counters.active_users(),
            "all stress steps complete"
        );
    })
}

/// Spike schedule: baseline load, sudden surge, then recovery observation.
pub(crate) fn spawn_spike_phases(
    ctx: SpawnContext,
    base_users: u32,
    spike_users: u32,
    spike_duration: Duration,
    recovery_duration: Duration,
    test_end: Instant,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(users = base_users, "spike phase 1: baseline load");
        for user_index in 0..base_users {
            if !ctx.running() {
                return;
            }
            ctx.spawn_user(user_index, test_end);
        }
        tokio::time::sleep(recovery_duration).await;
        if !ctx.running() {
            return;
        }

        let surge = spike_users - base_users;
        warn!(
            from = base_users,
            to = spike_users,
            adding = surge,
            hold_secs = spike_duration.as_secs(),
            "spike phase 2: surging load"
        );
        for offset in 0..surge {
            if !ctx.running() {
                return;
            }
            ctx.spawn_user(base_users + offset, test_end);
        }
        tokio::time::sleep(spike_duration).await;
        if !ctx.running() {
            return;
        }

        info!(
            observe_secs = recovery_duration.as_secs(),
            active_users = ctx.worker.counters.active_users(),
            "spike phase 3: observing recovery"
        );
        tokio::time::sleep(recovery_duration).await;

        info!("spike phases complete");
    })
}
