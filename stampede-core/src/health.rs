//! Health classification for window statistics

use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum requests in a window before the classifier will judge it
const MIN_SAMPLE_SIZE: u64 = 10;

const ERROR_RATE_FAILED: f64 = 0.20;
const ERROR_RATE_CRITICAL: f64 = 0.05;
const ERROR_RATE_DEGRADED: f64 = 0.01;

const AVG_LATENCY_FAILED_MS: f64 = 2000.0;
const AVG_LATENCY_CRITICAL_MS: f64 = 1000.0;
const AVG_LATENCY_DEGRADED_MS: f64 = 500.0;

/// Health of the target during one statistics window
///
/// Derived from a window's error rate and average latency. Error-rate tiers
/// always win over latency tiers: a window with 25% errors is FAILED even if
/// every response came back in 10ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    /// Error rate < 1% and average latency < 500ms
    Healthy,
    /// Error rate 1-5% or average latency 500-1000ms
    Degraded,
    /// Error rate 5-20% or average latency 1000-2000ms
    Critical,
    /// Error rate > 20% or average latency > 2000ms
    Failed,
}

impl HealthStatus {
    /// Classify a window from its aggregate numbers.
    ///
    /// Windows with fewer than 10 requests are reported HEALTHY: the sample
    /// is too small to call the target unhealthy.
    pub fn classify(avg_latency_ms: f64, error_rate: f64, request_count: u64) -> Self {
        if request_count < MIN_SAMPLE_SIZE {
            return HealthStatus::Healthy;
        }

        if error_rate > ERROR_RATE_FAILED {
            return HealthStatus::Failed;
        }
        if error_rate > ERROR_RATE_CRITICAL {
            return HealthStatus::Critical;
        }
        if error_rate > ERROR_RATE_DEGRADED {
            return HealthStatus::Degraded;
        }

        if avg_latency_ms > AVG_LATENCY_FAILED_MS {
            return HealthStatus::Failed;
        }
        if avg_latency_ms > AVG_LATENCY_CRITICAL_MS {
            return HealthStatus::Critical;
        }
        if avg_latency_ms > AVG_LATENCY_DEGRADED_MS {
            return HealthStatus::Degraded;
        }

        HealthStatus::Healthy
    }

    /// Operator-facing description of this tier
    pub fn description(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "normal",
            HealthStatus::Degraded => "performance degraded",
            HealthStatus::Critical => "near breaking point",
            HealthStatus::Failed => "past system limits",
        }
    }

    /// Whether this tier marks a breaking point
    pub fn is_breaking(&self) -> bool {
        matches!(self, HealthStatus::Critical | HealthStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "HEALTHY",
            HealthStatus::Degraded => "DEGRADED",
            HealthStatus::Critical => "CRITICAL",
            HealthStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_samples_are_healthy() {
        // 9 requests all failing is still below the sample floor
        assert_eq!(
            HealthStatus::classify(5000.0, 1.0, 9),
            HealthStatus::Healthy
        );
        assert_eq!(
            HealthStatus::classify(5000.0, 1.0, 10),
            HealthStatus::Failed
        );
    }

    #[test]
    fn error_rate_dominates_latency() {
        // Latency alone would be HEALTHY, error rate says FAILED
        assert_eq!(
            HealthStatus::classify(100.0, 0.21, 50),
            HealthStatus::Failed
        );
        assert_eq!(
            HealthStatus::classify(100.0, 0.06, 50),
            HealthStatus::Critical
        );
        assert_eq!(
            HealthStatus::classify(100.0, 0.02, 50),
            HealthStatus::Degraded
        );
    }

    #[test]
    fn latency_tiers_apply_when_errors_are_low() {
        assert_eq!(
            HealthStatus::classify(2500.0, 0.0, 50),
            HealthStatus::Failed
        );
        assert_eq!(
            HealthStatus::classify(1500.0, 0.0, 50),
            HealthStatus::Critical
        );
        assert_eq!(
            HealthStatus::classify(600.0, 0.0, 50),
            HealthStatus::Degraded
        );
        assert_eq!(
            HealthStatus::classify(100.0, 0.0, 50),
            HealthStatus::Healthy
        );
    }

    #[test]
    fn thresholds_are_exclusive() {
        // Exactly at a boundary stays in the lower tier
        assert_eq!(
            HealthStatus::classify(500.0, 0.0, 50),
            HealthStatus::Healthy
        );
        assert_eq!(
            HealthStatus::classify(100.0, 0.01, 100),
            HealthStatus::Healthy
        );
        assert_eq!(
            HealthStatus::classify(2000.0, 0.0, 50),
            HealthStatus::Critical
        );
    }

    #[test]
    fn serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Degraded).unwrap(),
            "\"DEGRADED\""
        );
    }
}
