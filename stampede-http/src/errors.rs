//! HTTP error types

use thiserror::Error;

/// Errors preparing a request; execution failures are reported as outcomes
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid header name: {0}")]
    InvalidHeaderName(String),

    #[error("invalid header value for '{0}'")]
    InvalidHeaderValue(String),

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}
