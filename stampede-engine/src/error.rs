//! Engine error types

use thiserror::Error;

/// Errors returned by the engine's control operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// Only one test may run per engine instance
    #[error("a load test is already running")]
    AlreadyRunning,

    /// The plan failed validation; nothing was started
    #[error(transparent)]
    InvalidPlan(#[from] stampede_core::PlanError),

    /// The target request could not be prepared
    #[error(transparent)]
    Http(#[from] stampede_http::HttpError),
}
