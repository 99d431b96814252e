//! Window snapshot publishing configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::ConfigResult;
use crate::validation::{validate_http_url, validate_positive, Validatable};

/// Window snapshot publishing configuration
///
/// With no endpoint configured the agent only logs window statistics; with
/// one, each snapshot is also POSTed there as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Collector endpoint receiving window snapshots
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Delivery timeout for one snapshot
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_timeout"
    )]
    pub timeout: Duration,

    /// Extra headers attached to every publish request
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout: default_timeout(),
            headers: HashMap::new(),
        }
    }
}

impl Validatable for ReportConfig {
    fn validate(&self) -> ConfigResult<()> {
        if let Some(ref endpoint) = self.endpoint {
            validate_http_url(endpoint, "endpoint", self.domain_name())?;
        }
        validate_positive(self.timeout.as_secs(), "timeout", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "report"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_optional() {
        assert!(ReportConfig::default().validate().is_ok());
    }

    #[test]
    fn endpoint_must_be_http() {
        let config = ReportConfig {
            endpoint: Some("redis://collector:6379".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ReportConfig {
            endpoint: Some("https://collector.example.com/v1/stats".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
