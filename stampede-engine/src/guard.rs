//! Latency SLO auto-stop guard

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::error;

use stampede_core::WindowSnapshot;

use crate::worker::StopReason;

/// Average window latency at which the SLO counter increments
pub(crate) const SLO_LATENCY_THRESHOLD_MS: f64 = 2000.0;
/// Consecutive violating windows before the run is stopped
pub(crate) const SLO_CONSECUTIVE_WINDOWS: u32 = 3;

/// Stops the run after sustained SLO-violating latency
///
/// Driven once per window by the reporter. The stop itself is a message on
/// the run's command channel, processed on the supervisor's own turn: the
/// reporter must never tear itself down from inside its own tick.
pub(crate) struct SloGuard {
    test_id: String,
    running: Arc<AtomicBool>,
    stop_tx: mpsc::UnboundedSender<StopReason>,
    consecutive_violations: u32,
    triggered: bool,
}

impl SloGuard {
    pub fn new(
        test_id: String,
        running: Arc<AtomicBool>,
        stop_tx: mpsc::UnboundedSender<StopReason>,
    ) -> Self {
        Self {
            test_id,
            running,
            stop_tx,
            consecutive_violations: 0,
            triggered: false,
        }
    }

    /// Feed one window; idle windows leave the counter untouched.
    pub fn observe(&mut self, snapshot: &WindowSnapshot) {
        if self.triggered || !self.running.load(Ordering::SeqCst) {
            return;
        }
        if snapshot.requests_per_second == 0 {
            return;
        }

        if snapshot.avg_latency_ms >= SLO_LATENCY_THRESHOLD_MS {
            self.consecutive_violations += 1;
        } else {
            self.consecutive_violations = 0;
        }

        if self.consecutive_violations >= SLO_CONSECUTIVE_WINDOWS {
            self.triggered = true;
            error!(
                test_id = %self.test_id,
                windows = self.consecutive_violations,
                threshold_ms = SLO_LATENCY_THRESHOLD_MS,
                "average latency SLO violated, stopping test"
            );
            let _ = self.stop_tx.send(StopReason::SloViolation);
        }
    }
}
