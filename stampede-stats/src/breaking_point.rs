//! Breaking point detection

use tracing::error;

use stampede_core::{BreakingPointInfo, HealthStatus, WindowSnapshot};

/// Latches on the first window whose health reaches CRITICAL or FAILED
///
/// Once latched, later windows are ignored: the interesting number is the
/// user count at which the target first gave out, not where it ended up.
#[derive(Debug, Default)]
pub struct BreakingPointTracker {
    latched: Option<(u32, HealthStatus)>,
}

impl BreakingPointTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one window; latches on the first breaking window.
    pub fn observe(&mut self, snapshot: &WindowSnapshot) {
        if self.latched.is_some() || !snapshot.health.is_breaking() {
            return;
        }
        self.latched = Some((snapshot.active_users, snapshot.health));
        error!(
            test_id = %snapshot.test_id,
            status = %snapshot.health,
            users = snapshot.active_users,
            tps = snapshot.requests_per_second,
            avg_latency_ms = format_args!("{:.1}", snapshot.avg_latency_ms),
            error_rate = format_args!("{:.2}%", snapshot.error_rate * 100.0),
            "breaking point detected"
        );
    }

    pub fn is_latched(&self) -> bool {
        self.latched.is_some()
    }

    /// The latched breaking point, if any, stamped with whether TPS
    /// saturation was also seen during the run.
    pub fn breaking_point(&self, tps_saturated: bool) -> Option<BreakingPointInfo> {
        self.latched.map(|(users, status)| BreakingPointInfo {
            users,
            status,
            tps_saturated,
        })
    }
}
