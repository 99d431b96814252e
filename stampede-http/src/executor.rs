//! Request execution and outcome measurement

use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::debug;

use stampede_config::HttpClientConfig;

use crate::errors::HttpError;
use crate::request::PreparedRequest;

/// Per-request timeout, fixed for every virtual user
///
/// A stalled target must surface as failed samples with 10s latency rather
/// than freezing the worker loop for the rest of the run.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Measured result of one request iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestOutcome {
    /// Time from send to fully drained response, or until the failure
    pub latency: Duration,
    /// True for status codes in 200..400
    pub success: bool,
    /// Status code when a response arrived at all
    pub status: Option<u16>,
}

/// Shared executor firing prepared requests and measuring outcomes
///
/// Wraps one pooled client; cheap to clone across virtual users. Transport
/// failures (timeout, refused connection, DNS, protocol errors) come back as
/// failed outcomes with the latency measured up to the failure, so they land
/// in the statistics like any other sample.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: Client,
}

impl RequestExecutor {
    /// Build an executor from the agent's HTTP client settings
    pub fn with_config(config: &HttpClientConfig) -> Result<Self, HttpError> {
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .pool_max_idle_per_host(config.max_idle_per_host)
            .build()
            .map_err(HttpError::ClientBuild)?;
        Ok(Self { client })
    }

    /// Build an executor with default settings
    pub fn new() -> Result<Self, HttpError> {
        Self::with_config(&HttpClientConfig::default())
    }

    /// Fire one request and measure it.
    pub async fn execute(&self, request: &PreparedRequest) -> RequestOutcome {
        let started = Instant::now();

        let mut builder = self
            .client
            .request(request.method().into(), request.url().clone())
            .headers(request.headers().clone());
        if let Some(body) = request.body() {
            builder = builder.body(body.to_string());
        }

        match builder.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                // Drain the body so the connection returns to the pool;
                // latency covers the full exchange.
                let drained = response.bytes().await.is_ok();
                let latency = started.elapsed();
                RequestOutcome {
                    latency,
                    success: drained && (200..400).contains(&status),
                    status: Some(status),
                }
            }
            Err(e) => {
                let latency = started.elapsed();
                debug!("request failed after {:?}: {}", latency, e);
                RequestOutcome {
                    latency,
                    success: false,
                    status: e.status().map(|s| s.as_u16()),
                }
            }
        }
    }
}
