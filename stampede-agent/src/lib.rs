//! Stampede agent library
//!
//! The binary wires an axum control surface (start/stop/ping/stats) around a
//! [`LoadEngine`](stampede_engine::LoadEngine) and ships window snapshots to
//! the configured publishers. Split out as a library so the control surface
//! can be exercised by tests.

pub mod api;
pub mod publishers;
