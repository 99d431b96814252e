//! Core domain types for Stampede
//!
//! This crate defines the types shared by every other Stampede crate: the
//! test plan (one variant per load discipline, validated at construction),
//! the per-second window snapshot produced by the statistics collector, the
//! health classification model, and the breaking-point summary captured when
//! a run degrades past recovery.

pub mod breaking_point;
pub mod error;
pub mod health;
pub mod plan;
pub mod snapshot;

pub use breaking_point::BreakingPointInfo;
pub use error::{PlanError, PlanResult};
pub use health::HealthStatus;
pub use plan::{LoadProfile, TargetSpec, TestPlan, TestPlanRequest};
pub use snapshot::WindowSnapshot;
