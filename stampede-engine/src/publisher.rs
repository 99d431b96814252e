//! Window snapshot publish sink

use async_trait::async_trait;
use thiserror::Error;

use stampede_core::WindowSnapshot;

/// Snapshot delivery errors
///
/// Publishing is fire-and-forget from the reporter's point of view: failures
/// are logged and the window is consumed either way.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("snapshot delivery failed: {0}")]
    Delivery(String),
}

/// Sink receiving one window snapshot per reporter tick
///
/// Implementations ship the snapshot wherever the orchestrator wants it:
/// the agent binary provides logging and webhook publishers, tests provide
/// channel-backed ones.
#[async_trait]
pub trait StatPublisher: Send + Sync {
    async fn publish(&self, snapshot: &WindowSnapshot) -> Result<(), PublishError>;
}

/// Publisher that discards every snapshot
pub struct NoopPublisher;

#[async_trait]
impl StatPublisher for NoopPublisher {
    async fn publish(&self, _snapshot: &WindowSnapshot) -> Result<(), PublishError> {
        Ok(())
    }
}
