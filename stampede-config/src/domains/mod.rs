//! Domain-specific configuration modules

pub mod http;
pub mod logging;
pub mod report;
pub mod server;
pub mod utils;

use serde::{Deserialize, Serialize};

use crate::error::ConfigResult;
use crate::validation::Validatable;

/// Complete agent configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Control surface server settings
    pub server: server::ServerConfig,

    /// HTTP client settings for load generation
    pub http: http::HttpClientConfig,

    /// Window snapshot publishing settings
    pub report: report::ReportConfig,

    /// Logging settings
    pub logging: logging::LoggingConfig,
}

impl AgentConfig {
    /// Validate every domain
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.server.validate()?;
        self.http.validate()?;
        self.report.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}
