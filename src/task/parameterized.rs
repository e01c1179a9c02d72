// src/task/parameterized.rs

//! Parameter-driven collection tasks.
//!
//! Parameters usually come from the payload of a task that ran earlier in the
//! same run. Each parameter is executed in turn and faults are handled per
//! parameter according to an [`ErrorStrategy`], with a per-task
//! [`ParameterizedIterableTask::on_error`] hook consulted first.

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::engine::{ExecutionContext, TaskName, TaskResult};
use crate::errors::{Result, TaskseqError};
use crate::task::{Task, open_iterator};
use crate::types::ErrorStrategy;

/// What to do with a fault, as decided by
/// [`ParameterizedIterableTask::on_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorDecision {
    /// Apply the configured [`ErrorStrategy`].
    #[default]
    UseStrategy,
    /// Treat the fault as handled: retry if the strategy is `Retry` and
    /// attempts remain, otherwise record it and move to the next parameter.
    Continue,
    /// Abort the task now, regardless of strategy or remaining retries.
    Escalate,
}

pub trait ParameterizedIterableTask: Send + Sync {
    type Param: Serialize;

    fn name(&self) -> &str;

    fn depends_on(&self) -> Vec<TaskName> {
        Vec::new()
    }

    fn get_parameters(&self, ctx: &ExecutionContext) -> anyhow::Result<Vec<Self::Param>>;

    /// Stable identity of a parameter across runs.
    ///
    /// Defaults to the parameter's JSON form; string parameters are used
    /// verbatim.
    fn parameter_id(&self, param: &Self::Param) -> String {
        match serde_json::to_value(param) {
            Ok(Value::String(s)) => s,
            Ok(other) => other.to_string(),
            Err(err) => format!("<unserializable: {err}>"),
        }
    }

    fn execute_for_parameter(&self, param: &Self::Param, ctx: &ExecutionContext)
    -> anyhow::Result<()>;

    fn on_error(
        &self,
        _param: &Self::Param,
        _error: &anyhow::Error,
        _ctx: &ExecutionContext,
    ) -> ErrorDecision {
        ErrorDecision::UseStrategy
    }
}

/// How the attempts for one parameter ended.
enum Verdict {
    Succeeded,
    /// Give up on this parameter and move on.
    Skip(anyhow::Error),
    /// Give up on the whole task.
    Abort(anyhow::Error),
}

/// Runs a [`ParameterizedIterableTask`] under an [`ErrorStrategy`].
#[derive(Debug)]
pub struct Parameterized<T> {
    inner: T,
    strategy: ErrorStrategy,
    max_retries: u32,
}

impl<T: ParameterizedIterableTask> Parameterized<T> {
    /// `Retry` requires `max_retries > 0`.
    pub fn new(inner: T, strategy: ErrorStrategy, max_retries: u32) -> Result<Self> {
        if strategy == ErrorStrategy::Retry && max_retries == 0 {
            return Err(TaskseqError::Config(format!(
                "task '{}': error_strategy \"retry\" requires max_retries > 0",
                inner.name()
            )));
        }
        Ok(Self {
            inner,
            strategy,
            max_retries,
        })
    }

    /// Default configuration: stop on the first fault.
    pub fn stop_on_error(inner: T) -> Self {
        Self {
            inner,
            strategy: ErrorStrategy::Stop,
            max_retries: 0,
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn strategy(&self) -> ErrorStrategy {
        self.strategy
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Attempt one parameter until it succeeds or a decision moves on.
    fn attempt(&self, param: &T::Param, id: &str, ctx: &ExecutionContext) -> (Verdict, u32) {
        let name = self.inner.name();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let err = match self.inner.execute_for_parameter(param, ctx) {
                Ok(()) => return (Verdict::Succeeded, attempts),
                Err(err) => err,
            };

            let can_retry =
                self.strategy == ErrorStrategy::Retry && attempts <= self.max_retries;

            let verdict = match self.inner.on_error(param, &err, ctx) {
                ErrorDecision::Escalate => Verdict::Abort(err),
                ErrorDecision::Continue if can_retry => {
                    debug!(task = %name, parameter = %id, attempts, error = %err, "retrying parameter");
                    continue;
                }
                ErrorDecision::Continue => Verdict::Skip(err),
                ErrorDecision::UseStrategy => match self.strategy {
                    ErrorStrategy::Stop => Verdict::Abort(err),
                    ErrorStrategy::Continue => Verdict::Skip(err),
                    ErrorStrategy::Retry if can_retry => {
                        debug!(task = %name, parameter = %id, attempts, error = %err, "retrying parameter");
                        continue;
                    }
                    ErrorStrategy::Retry => Verdict::Skip(err),
                },
            };
            return (verdict, attempts);
        }
    }
}

impl<T: ParameterizedIterableTask> Task for Parameterized<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn depends_on(&self) -> Vec<TaskName> {
        self.inner.depends_on()
    }

    fn execute(&self, ctx: &ExecutionContext) -> anyhow::Result<TaskResult> {
        let name = self.inner.name();
        let params = self.inner.get_parameters(ctx)?;
        let total = params.len();
        let mut iter = open_iterator(params, |p| self.inner.parameter_id(p), name, ctx)?;

        info!(task = %name, total, strategy = %self.strategy, "processing parameters");

        let mut processed = 0usize;
        let mut attempted = 0usize;
        let mut errors: Vec<Value> = Vec::new();
        let mut outcomes: Vec<Value> = Vec::new();

        while let Some(param) = iter.next() {
            if ctx.is_cancelled() {
                warn!(task = %name, attempted, "cancelled between parameters");
                iter.fail("cancelled")?;
                return Ok(TaskResult::failure("cancelled")
                    .with_data("processed", processed)
                    .with_data("attempted", attempted)
                    .with_data("remaining", iter.remaining() + 1)
                    .with_data("total", total)
                    .with_data("errors", errors)
                    .with_data("outcomes", outcomes));
            }

            let id = iter.item_id(&param);
            attempted += 1;

            match self.attempt(&param, &id, ctx) {
                (Verdict::Succeeded, attempts) => {
                    iter.mark_done(&param)?;
                    processed += 1;
                    outcomes.push(json!({
                        "parameter": id,
                        "status": "success",
                        "attempts": attempts,
                    }));
                }
                (Verdict::Skip(err), attempts) => {
                    let message = format!("{err:#}");
                    warn!(task = %name, parameter = %id, attempts, error = %message, "parameter failed; continuing");
                    errors.push(json!({ "parameter": id, "error": message }));
                    outcomes.push(json!({
                        "parameter": id,
                        "status": "failed",
                        "attempts": attempts,
                        "error": message,
                    }));
                }
                (Verdict::Abort(err), attempts) => {
                    let message = format!("{err:#}");
                    warn!(task = %name, parameter = %id, attempts, error = %message, "parameter failed; stopping task");
                    errors.push(json!({ "parameter": id, "error": message }));
                    outcomes.push(json!({
                        "parameter": id,
                        "status": "failed",
                        "attempts": attempts,
                        "error": message,
                    }));
                    let summary = format!("parameter '{id}' failed: {message}");
                    iter.fail(summary.clone())?;
                    return Ok(TaskResult::failure(summary)
                        .with_data("processed", processed)
                        .with_data("attempted", attempted)
                        .with_data("remaining", iter.remaining())
                        .with_data("total", total)
                        .with_data("skipped", iter.skipped())
                        .with_data("errors", errors)
                        .with_data("outcomes", outcomes));
                }
            }
        }

        let failed = errors.len();
        let skipped = iter.skipped();
        let result = if failed == 0 {
            iter.complete()?;
            TaskResult::success()
        } else {
            let summary = format!("{failed} of {attempted} parameters failed");
            iter.fail(summary.clone())?;
            TaskResult::failure(summary)
        };

        debug!(task = %name, processed, failed, skipped, total, "parameter loop finished");

        Ok(result
            .with_data("processed", processed)
            .with_data("failed", failed)
            .with_data("attempted", attempted)
            .with_data("skipped", skipped)
            .with_data("total", total)
            .with_data("errors", errors)
            .with_data("outcomes", outcomes))
    }
}
