//! Snapshot publishers
//!
//! The engine treats publishing as fire-and-forget; these implementations
//! decide where a window snapshot actually goes. The log publisher is always
//! on. When a report endpoint is configured, snapshots are also POSTed there
//! and both sinks run behind a composite.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::info;

use stampede_config::ReportConfig;
use stampede_core::WindowSnapshot;
use stampede_engine::{PublishError, StatPublisher};

/// Logs every window snapshot as a structured event
pub struct LogPublisher;

#[async_trait]
impl StatPublisher for LogPublisher {
    async fn publish(&self, snapshot: &WindowSnapshot) -> Result<(), PublishError> {
        info!(
            test_id = %snapshot.test_id,
            users = snapshot.active_users,
            tps = snapshot.requests_per_second,
            errors = snapshot.error_count,
            avg_ms = format_args!("{:.1}", snapshot.avg_latency_ms),
            p50_ms = format_args!("{:.1}", snapshot.p50_latency_ms),
            p95_ms = format_args!("{:.1}", snapshot.p95_latency_ms),
            p99_ms = format_args!("{:.1}", snapshot.p99_latency_ms),
            status = %snapshot.health,
            "window"
        );
        Ok(())
    }
}

/// POSTs each snapshot as JSON to the configured collector endpoint
pub struct WebhookPublisher {
    client: reqwest::Client,
    endpoint: String,
    headers: HeaderMap,
}

impl WebhookPublisher {
    /// Build a webhook publisher from the report configuration.
    ///
    /// Returns `None` when no endpoint is configured.
    pub fn from_config(config: &ReportConfig) -> anyhow::Result<Option<Self>> {
        let Some(endpoint) = config.endpoint.clone() else {
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(config.timeout)
            .build()?;

        let mut headers = HeaderMap::with_capacity(config.headers.len());
        for (key, value) in &config.headers {
            let name = HeaderName::from_str(key)
                .map_err(|_| anyhow::anyhow!("invalid report header name '{key}'"))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| anyhow::anyhow!("invalid report header value for '{key}'"))?;
            headers.insert(name, value);
        }

        Ok(Some(Self {
            client,
            endpoint,
            headers,
        }))
    }
}

#[async_trait]
impl StatPublisher for WebhookPublisher {
    async fn publish(&self, snapshot: &WindowSnapshot) -> Result<(), PublishError> {
        self.client
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .json(snapshot)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| PublishError::Delivery(e.to_string()))?;
        Ok(())
    }
}

/// Fans one snapshot out to several sinks
///
/// Every sink is attempted; the last failure is reported so the reporter
/// logs it.
pub struct CompositePublisher {
    sinks: Vec<Arc<dyn StatPublisher>>,
}

impl CompositePublisher {
    pub fn new(sinks: Vec<Arc<dyn StatPublisher>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl StatPublisher for CompositePublisher {
    async fn publish(&self, snapshot: &WindowSnapshot) -> Result<(), PublishError> {
        let mut failure = None;
        for sink in &self.sinks {
            if let Err(e) = sink.publish(snapshot).await {
                failure = Some(e);
            }
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Assemble the publisher stack for the agent.
pub fn build_publisher(config: &ReportConfig) -> anyhow::Result<Arc<dyn StatPublisher>> {
    let mut sinks: Vec<Arc<dyn StatPublisher>> = vec![Arc::new(LogPublisher)];
    if let Some(webhook) = WebhookPublisher::from_config(config)? {
        info!(endpoint = %config.endpoint.as_deref().unwrap_or_default(), "report endpoint configured");
        sinks.push(Arc::new(webhook));
    }
    if sinks.len() == 1 {
        Ok(sinks.remove(0))
    } else {
        Ok(Arc::new(CompositePublisher::new(sinks)))
    }
}
