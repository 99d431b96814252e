//! Test plan error types

use thiserror::Error;

/// Result type for plan construction and validation
pub type PlanResult<T> = Result<T, PlanError>;

/// Errors rejecting a test plan before a run starts
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    /// The request named a discipline the engine does not implement
    #[error("unknown test type: '{0}'. Supported types are: LOAD, SOAK, STRESS, SPIKE")]
    UnknownTestType(String),

    /// A discipline-specific field was absent from the request
    #[error("missing field for {test_type} test: {field}")]
    MissingField {
        test_type: &'static str,
        field: &'static str,
    },

    /// A field was present but out of bounds
    #[error("invalid {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },

    /// The target URL failed validation
    #[error("invalid target url: {0}")]
    InvalidTargetUrl(String),
}

impl PlanError {
    pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        PlanError::InvalidField {
            field,
            message: message.into(),
        }
    }
}
