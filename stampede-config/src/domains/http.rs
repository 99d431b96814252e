//! HTTP client configuration for load generation
//!
//! The per-request timeout is deliberately not configurable: every request a
//! virtual user issues is capped at 10 seconds so a stalled target shows up
//! as failed samples, not as a hung run.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, Validatable};

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Connection establishment timeout
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_connect_timeout"
    )]
    pub connect_timeout: Duration,

    /// User agent string sent with every generated request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Whether to verify TLS certificates on the target
    #[serde(default = "crate::domains::utils::default_true")]
    pub verify_ssl: bool,

    /// Maximum idle connections kept per host
    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_per_host: usize,
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_user_agent() -> String {
    concat!("stampede/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_max_idle_per_host() -> usize {
    64
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
            verify_ssl: true,
            max_idle_per_host: default_max_idle_per_host(),
        }
    }
}

impl Validatable for HttpClientConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(
            self.connect_timeout.as_secs(),
            "connect_timeout",
            self.domain_name(),
        )?;
        validate_required_string(&self.user_agent, "user_agent", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = HttpClientConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.verify_ssl);
    }

    #[test]
    fn empty_user_agent_rejected() {
        let config = HttpClientConfig {
            user_agent: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn duration_serializes_as_seconds() {
        let config = HttpClientConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("connect_timeout: 10"));
    }
}
