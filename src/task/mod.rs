// src/task/mod.rs

//! Task abstraction.
//!
//! A [`Task`] is one named unit of work with declared dependencies. Collection
//! behaviour is layered on by composition:
//!
//! - [`Iterating`] turns an [`IterableTask`] (items + per-item hook) into a
//!   resumable `Task`.
//! - [`Parameterized`] turns a [`ParameterizedIterableTask`] (parameters
//!   derived from earlier results + per-parameter hook) into a `Task` governed
//!   by an [`ErrorStrategy`](crate::types::ErrorStrategy).
//! - [`FnTask`] wraps a closure.

use std::fmt;

use crate::engine::{ExecutionContext, TaskName, TaskResult};
use crate::errors::ProgressError;
use crate::progress::ResumableIterator;

pub mod iterable;
pub mod parameterized;

pub use iterable::{IterableTask, Iterating};
pub use parameterized::{ErrorDecision, Parameterized, ParameterizedIterableTask};

/// One execution capability.
///
/// Returning `Err` (or panicking) is a fault; the orchestrator turns it into a
/// failure result for the task.
pub trait Task: Send + Sync {
    /// Unique, stable identifier of the task.
    fn name(&self) -> &str;

    /// Tasks that must appear earlier in any order that includes this one.
    fn depends_on(&self) -> Vec<TaskName> {
        Vec::new()
    }

    fn execute(&self, ctx: &ExecutionContext) -> anyhow::Result<TaskResult>;
}

/// A task backed by a closure.
pub struct FnTask<F> {
    name: TaskName,
    deps: Vec<TaskName>,
    body: F,
}

impl<F> FnTask<F>
where
    F: Fn(&ExecutionContext) -> anyhow::Result<TaskResult> + Send + Sync,
{
    pub fn new(name: impl Into<TaskName>, body: F) -> Self {
        Self {
            name: name.into(),
            deps: Vec::new(),
            body,
        }
    }

    /// Declare dependencies.
    pub fn after<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        self.deps = deps.into_iter().map(Into::into).collect();
        self
    }
}

impl<F> Task for FnTask<F>
where
    F: Fn(&ExecutionContext) -> anyhow::Result<TaskResult> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn depends_on(&self) -> Vec<TaskName> {
        self.deps.clone()
    }

    fn execute(&self, ctx: &ExecutionContext) -> anyhow::Result<TaskResult> {
        (self.body)(ctx)
    }
}

impl<F> fmt::Debug for FnTask<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask")
            .field("name", &self.name)
            .field("deps", &self.deps)
            .finish()
    }
}

/// Open a resumable iterator for a collection task, honouring the run mode:
/// `resume` skips what earlier runs finished, anything else starts fresh.
pub(crate) fn open_iterator<T, F>(
    items: Vec<T>,
    id_of: F,
    task_name: &str,
    ctx: &ExecutionContext,
) -> Result<ResumableIterator<T, F>, ProgressError>
where
    F: Fn(&T) -> String,
{
    let store = ctx.store().clone();
    let iter = if ctx.is_resume() {
        ResumableIterator::new(items, id_of, task_name, store)?
    } else {
        ResumableIterator::fresh(items, id_of, task_name, store)?
    };
    Ok(iter.with_observer(ctx.observer().clone()))
}
