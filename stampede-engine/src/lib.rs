//! Load generation orchestration for Stampede
//!
//! [`LoadEngine`] runs one test at a time: it dispatches on the plan's load
//! profile, spawns one lightweight task per virtual user, aggregates their
//! outcomes through `stampede-stats`, and reports a window snapshot every
//! second. Protection is layered: a per-worker consecutive-failure limit, a
//! run-wide error-rate circuit breaker, a latency SLO guard evaluated per
//! window, and a horizon monitor. Every trigger converges on the same
//! idempotent [`LoadEngine::stop`] through the run's command channel.

pub mod error;
pub mod generator;
pub mod publisher;

mod guard;
mod reporter;
mod scheduler;
mod worker;

pub use error::EngineError;
pub use generator::{EngineStats, LoadEngine};
pub use publisher::{NoopPublisher, PublishError, StatPublisher};
