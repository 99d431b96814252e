//! Windowed statistics collection and failure detectors for Stampede
//!
//! [`WindowedStatsCollector`] is the one piece of state every virtual user
//! mutates concurrently; everything else in this crate is driven one window
//! at a time by the single reporter task. The collector accumulates request
//! outcomes into a 1-second window and drains it atomically into a
//! [`WindowSnapshot`]; the [`BreakingPointTracker`] and
//! [`SaturationDetector`] watch the resulting snapshot stream for the first
//! signs of the target giving out.
//!
//! [`WindowSnapshot`]: stampede_core::WindowSnapshot

pub mod breaking_point;
pub mod collector;
pub mod saturation;

pub use breaking_point::BreakingPointTracker;
pub use collector::WindowedStatsCollector;
pub use saturation::SaturationDetector;
