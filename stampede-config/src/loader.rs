//! Configuration loading and environment variable handling

use std::path::Path;
use std::time::Duration;

use crate::domains::AgentConfig;
use crate::error::{ConfigError, ConfigResult};

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new config loader with the default prefix
    pub fn new() -> Self {
        Self {
            prefix: "STAMPEDE".to_string(),
        }
    }

    /// Create a new config loader with a custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<AgentConfig> {
        let content = std::fs::read_to_string(path)?;
        let mut config: AgentConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from defaults and environment variables only
    pub fn from_env(&self) -> ConfigResult<AgentConfig> {
        let mut config = AgentConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<AgentConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut AgentConfig) -> ConfigResult<()> {
        if let Ok(bind) = self.get_env_var("SERVER_BIND") {
            config.server.bind_address = bind
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("invalid SERVER_BIND: {}", e)))?;
        }

        if let Ok(timeout) = self.get_env_var("HTTP_CONNECT_TIMEOUT") {
            let seconds: u64 = timeout.parse().map_err(|e| {
                ConfigError::EnvError(format!("invalid HTTP_CONNECT_TIMEOUT: {}", e))
            })?;
            config.http.connect_timeout = Duration::from_secs(seconds);
        }

        if let Ok(user_agent) = self.get_env_var("HTTP_USER_AGENT") {
            config.http.user_agent = user_agent;
        }

        if let Ok(verify_ssl) = self.get_env_var("HTTP_VERIFY_SSL") {
            config.http.verify_ssl = verify_ssl
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("invalid HTTP_VERIFY_SSL: {}", e)))?;
        }

        if let Ok(endpoint) = self.get_env_var("REPORT_URL") {
            config.report.endpoint = Some(endpoint);
        }

        if let Ok(timeout) = self.get_env_var("REPORT_TIMEOUT") {
            let seconds: u64 = timeout
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("invalid REPORT_TIMEOUT: {}", e)))?;
            config.report.timeout = Duration::from_secs(seconds);
        }

        if let Ok(level) = self.get_env_var("LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(())
    }

    fn get_env_var(&self, suffix: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, suffix))
    }
}
