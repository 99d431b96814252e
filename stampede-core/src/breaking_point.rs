//! Breaking point summary

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::health::HealthStatus;

/// The first window at which the target degraded to CRITICAL or FAILED
///
/// Latched once per run; later windows never overwrite it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakingPointInfo {
    /// Active virtual users when the breaking point was hit
    pub users: u32,
    /// Health tier that triggered the latch
    pub status: HealthStatus,
    /// Whether TPS saturation was also observed during the run
    pub tps_saturated: bool,
}

impl fmt::Display for BreakingPointInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} users ({})", self.users, self.status)?;
        if self.tps_saturated {
            write!(f, ", TPS saturated")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_saturation_only_when_set() {
        let bp = BreakingPointInfo {
            users: 120,
            status: HealthStatus::Critical,
            tps_saturated: false,
        };
        assert_eq!(bp.to_string(), "120 users (CRITICAL)");

        let bp = BreakingPointInfo {
            tps_saturated: true,
            ..bp
        };
        assert_eq!(bp.to_string(), "120 users (CRITICAL), TPS saturated");
    }
}
