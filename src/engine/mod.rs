// src/engine/mod.rs

//! Watch dispatch engine.
//!
//! This module ties together:
//! - the change batch (what happens when events arrive faster than cycles)
//! - the pure dispatcher state machine in [`core`]
//! - the pipeline runner that executes resolved steps in order
//! - the async event loop in [`runtime`], which owns the debounce timer
//!   and reacts to:
//!   - filesystem changes
//!   - debounce expiry
//!   - finished cycles
//!   - shutdown signals

use std::path::PathBuf;

use crate::types::TaskName;

/// Events flowing into the dispatcher from the watcher, the timer and the
/// cycle backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    /// The watch loop has started.
    Started,
    /// A path (relative to the project root) changed on disk.
    FileChanged(PathBuf),
    /// The debounce window armed by the last `ArmDebounce` has passed.
    DebounceElapsed,
    /// A dispatching cycle completed. `outputs_changed` lists the
    /// project-relative outputs the cycle wrote or removed.
    CycleFinished { outputs_changed: Vec<PathBuf> },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

/// What one cycle should run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CyclePlan {
    /// Pipelines (or single tasks), deduplicated, in binding order.
    pub pipelines: Vec<TaskName>,
    /// The coalesced paths that caused this cycle.
    pub changed: Vec<PathBuf>,
}

/// Result of running a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Outputs written or removed, relative to the project root.
    pub outputs_changed: Vec<PathBuf>,
    /// Pipelines that failed, with their error message.
    pub failures: Vec<(TaskName, String)>,
}

pub mod coalesce;
pub mod core;
pub mod pipeline;
pub mod runtime;

pub use coalesce::ChangeBatch;
pub use core::{DispatchCommand, DispatchState, DispatchStep, Dispatcher};
pub use pipeline::{CycleBackend, PipelineRunner};
pub use runtime::DispatchRuntime;
