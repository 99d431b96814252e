//! TPS saturation detection
//!
//! Saturation means the target, not the generator, is the bottleneck: user
//! count keeps growing while throughput drops, or throughput-per-user falls
//! off a cliff. The detector compares each window against the immediately
//! preceding one and latches once per run; a softer, repeatable stagnation
//! warning fires when throughput barely responds to added users.

use tracing::{error, warn};

use stampede_core::WindowSnapshot;

/// Both windows must carry at least this much traffic to be judged
const MIN_WINDOW_TPS: u64 = 10;
/// Latch when throughput-per-user falls by more than this percentage
const PER_USER_DROP_PERCENT: f64 = -15.0;
/// Stagnation: TPS growth below half the user growth
const STAGNATION_RATIO: f64 = 0.5;
/// Stagnation is only meaningful past this user count
const STAGNATION_MIN_USERS: u32 = 50;

#[derive(Debug, Clone, Copy)]
struct PreviousWindow {
    tps: u64,
    users: u32,
}

/// Detects TPS saturation from consecutive window snapshots
///
/// Fed only windows with nonzero throughput. The previous-window slot is
/// never cleared: a stretch of low-volume windows simply fails the
/// evaluation preconditions until traffic comes back.
#[derive(Debug, Default)]
pub struct SaturationDetector {
    previous: Option<PreviousWindow>,
    latched: bool,
}

impl SaturationDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one window with nonzero throughput.
    pub fn observe(&mut self, snapshot: &WindowSnapshot) {
        if let Some(prev) = self.previous {
            self.evaluate(prev, snapshot);
        }
        self.previous = Some(PreviousWindow {
            tps: snapshot.requests_per_second,
            users: snapshot.active_users,
        });
    }

    pub fn is_saturated(&self) -> bool {
        self.latched
    }

    fn evaluate(&mut self, prev: PreviousWindow, snapshot: &WindowSnapshot) {
        let current_tps = snapshot.requests_per_second;
        let current_users = snapshot.active_users;

        // Too little traffic to judge either side
        if current_tps < MIN_WINDOW_TPS || prev.tps < MIN_WINDOW_TPS {
            return;
        }
        // Saturation is only meaningful while load is still being added
        if current_users <= prev.users {
            return;
        }

        let tps_change = current_tps as f64 - prev.tps as f64;
        let user_change = f64::from(current_users - prev.users);

        let current_tps_per_user = current_tps as f64 / f64::from(current_users);
        let prev_tps_per_user = prev.tps as f64 / f64::from(prev.users);
        let per_user_change_percent =
            (current_tps_per_user - prev_tps_per_user) / prev_tps_per_user * 100.0;

        let absolute_decrease = tps_change < 0.0;
        let per_user_decrease = per_user_change_percent < PER_USER_DROP_PERCENT;
        let stagnant = tps_change < user_change * STAGNATION_RATIO;

        if !self.latched && (absolute_decrease || per_user_decrease) {
            self.latched = true;
            error!(
                test_id = %snapshot.test_id,
                users = format_args!("{} -> {}", prev.users, current_users),
                tps = format_args!("{} -> {}", prev.tps, current_tps),
                tps_per_user = format_args!(
                    "{:.2} -> {:.2} ({:+.1}%)",
                    prev_tps_per_user, current_tps_per_user, per_user_change_percent
                ),
                "TPS saturation detected"
            );
        } else if stagnant && !absolute_decrease && current_users > STAGNATION_MIN_USERS {
            warn!(
                test_id = %snapshot.test_id,
                users = format_args!("{} -> {}", prev.users, current_users),
                tps = format_args!("{} -> {}", prev.tps, current_tps),
                "TPS stagnating despite added users (saturation warning)"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(tps: u64, users: u32) -> WindowSnapshot {
        let mut snap = WindowSnapshot::empty("t-1", 0, users);
        snap.requests_per_second = tps;
        snap
    }

    #[test]
    fn absolute_tps_drop_latches() {
        let mut detector = SaturationDetector::new();
        detector.observe(&window(100, 50));
        detector.observe(&window(90, 60));
        assert!(detector.is_saturated());
    }

    #[test]
    fn rising_tps_does_not_latch() {
        let mut detector = SaturationDetector::new();
        detector.observe(&window(100, 50));
        detector.observe(&window(150, 60));
        assert!(!detector.is_saturated());
    }

    #[test]
    fn per_user_drop_beyond_threshold_latches() {
        // 2.00 -> 1.667 per user is a 16.7% drop
        let mut detector = SaturationDetector::new();
        detector.observe(&window(100, 50));
        detector.observe(&window(100, 60));
        assert!(detector.is_saturated());
    }

    #[test]
    fn per_user_drop_at_exactly_threshold_does_not_latch() {
        // 2.00 -> 1.70 per user is exactly -15.0%
        let mut detector = SaturationDetector::new();
        detector.observe(&window(100, 50));
        detector.observe(&window(102, 60));
        assert!(!detector.is_saturated());
    }

    #[test]
    fn low_volume_windows_are_not_judged() {
        let mut detector = SaturationDetector::new();
        detector.observe(&window(9, 50));
        detector.observe(&window(5, 60));
        assert!(!detector.is_saturated());

        // The low-volume window still becomes the comparison point
        detector.observe(&window(100, 70));
        assert!(!detector.is_saturated());
    }

    #[test]
    fn shrinking_user_count_is_not_judged() {
        let mut detector = SaturationDetector::new();
        detector.observe(&window(100, 60));
        detector.observe(&window(50, 40));
        assert!(!detector.is_saturated());
    }

    #[test]
    fn latch_is_permanent() {
        let mut detector = SaturationDetector::new();
        detector.observe(&window(100, 50));
        detector.observe(&window(90, 60));
        detector.observe(&window(200, 70));
        assert!(detector.is_saturated());
    }
}
