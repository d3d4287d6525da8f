//! # Client State
//!
//! Progress state a client keeps while a research task runs.

pub mod task_progress;

pub use task_progress::{
    format_clock, spawn_ticker, Clock, PhaseSpec, PhaseStatus, PhaseUpdate, TaskPhase,
    TaskProgress, TaskProgressTracker, TaskSignal,
};
