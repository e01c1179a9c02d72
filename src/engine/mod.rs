// src/engine/mod.rs

//! Execution engine for taskseq.
//!
//! This module ties together:
//! - the per-run [`ExecutionContext`] handed to every task
//! - the [`ExecutionObserver`] hook for progress reporting
//! - the [`Orchestrator`], which validates an order, runs it task by task and
//!   aggregates an [`ExecutionResult`]
//!
//! The engine is synchronous; the async CLI shell drives it from a blocking
//! thread.

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

pub mod context;
pub mod observer;
pub mod orchestrator;
pub mod result;

pub use context::{CancelFlag, ExecutionContext, RunConfig};
pub use observer::{ExecutionObserver, NoopObserver};
pub use orchestrator::{Orchestrator, RunPhase};
pub use result::{ExecutionResult, RunStatus, TaskOutcome, TaskResult};
pub use crate::types::ExecutionMode;
