//! Monotonic progress display.
//!
//! - [`merge`]: pure selection between server progress and the stall estimate
//! - [`tracker`]: the per-run state machine
//! - [`run`]: lifecycle owner that drives the smoothing timer

pub mod merge;
pub mod run;
pub mod tracker;

pub use run::ProgressRun;
pub use tracker::{ProgressSnapshot, ProgressTracker, RunState};
