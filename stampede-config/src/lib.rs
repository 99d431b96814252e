//! Domain-driven configuration for the Stampede agent
//!
//! Operator configuration split by functional domain, with serde defaults,
//! validation, and `STAMPEDE_*` environment variable overrides. Per-run test
//! plans are not configuration; they arrive through the control surface and
//! live in `stampede-core`.

pub mod error;
pub mod loader;
pub mod validation;

pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

pub use domains::{
    http::HttpClientConfig,
    logging::{LogFormat, LoggingConfig},
    report::ReportConfig,
    server::ServerConfig,
    AgentConfig,
};
pub use validation::Validatable;
