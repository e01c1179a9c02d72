// src/engine/orchestrator.rs

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::dag::DependencyValidator;
use crate::engine::{
    ExecutionContext, ExecutionObserver, ExecutionResult, NoopObserver, RunConfig, RunStatus,
    TaskName, TaskResult,
};
use crate::errors::DependencyError;
use crate::progress::ProgressStore;
use crate::registry::TaskRegistry;
use crate::task::Task;
use crate::types::ExecutionMode;

/// Lifecycle of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    NotStarted,
    Validating,
    Running,
    Completed,
    Failed,
}

/// Drives a run: validates the order, executes tasks one after another and
/// stops at the first failure.
///
/// The orchestrator never retries a task and never writes to the progress
/// store; both are the tasks' business.
pub struct Orchestrator {
    registry: TaskRegistry,
    store: Arc<dyn ProgressStore>,
    observer: Arc<dyn ExecutionObserver>,
    validator: DependencyValidator,
}

impl Orchestrator {
    pub fn new(registry: TaskRegistry, store: Arc<dyn ProgressStore>) -> Self {
        Self {
            registry,
            store,
            observer: Arc::new(NoopObserver),
            validator: DependencyValidator::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn ProgressStore> {
        &self.store
    }

    /// Validate an order without running anything.
    pub fn validate<S: AsRef<str>>(&self, order: &[S]) -> Result<(), DependencyError> {
        self.validator.validate(order, &self.registry)
    }

    /// Run `order` in `mode`. `resume = true` forces [`ExecutionMode::Resume`].
    pub fn execute<I, S>(&self, order: I, mode: ExecutionMode, resume: bool) -> ExecutionResult
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mode = if resume { ExecutionMode::Resume } else { mode };
        self.execute_with(order, RunConfig::new(mode))
    }

    /// Run `order` with a full [`RunConfig`].
    pub fn execute_with<I, S>(&self, order: I, config: RunConfig) -> ExecutionResult
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let order: Vec<TaskName> = order.into_iter().map(|s| s.as_ref().to_string()).collect();
        let mode = config.mode;
        let mut phase = RunPhase::NotStarted;

        info!(mode = %mode, tasks = order.len(), "starting run");

        transition(&mut phase, RunPhase::Validating);
        if let Err(err) = self.validate(order.as_slice()) {
            warn!(kind = %err.kind, task = %err.task, error = %err.message, "task order rejected");
            transition(&mut phase, RunPhase::Failed);
            return ExecutionResult::rejected(mode, order, err);
        }

        if mode == ExecutionMode::DryRun {
            info!(plan = ?order, "dry run: order is valid, nothing executed");
            transition(&mut phase, RunPhase::Completed);
            return ExecutionResult::planned(mode, order);
        }

        transition(&mut phase, RunPhase::Running);

        let mut ctx = ExecutionContext::new(
            order.clone(),
            self.store.clone(),
            self.observer.clone(),
            config,
        );
        let mut completed = Vec::new();
        let mut failed = Vec::new();
        let mut errors = IndexMap::new();

        for name in &order {
            let result = if ctx.is_cancelled() {
                warn!(task = %name, "run cancelled before task started");
                TaskResult::failure("run cancelled")
            } else {
                self.run_task(name, &ctx)
            };

            if result.is_success() {
                debug!(task = %name, state = "success", "task finished");
                completed.push(name.clone());
                ctx.record(name.clone(), result);
                continue;
            }

            let message = result
                .error_message()
                .unwrap_or_else(|| "task failed".to_string());
            warn!(task = %name, error = %message, "task failed; stopping run");
            failed.push(name.clone());
            errors.insert(name.clone(), message);
            ctx.record(name.clone(), result);
            break;
        }

        let status = RunStatus::from_counts(completed.len(), failed.len());
        transition(
            &mut phase,
            if status == RunStatus::Success {
                RunPhase::Completed
            } else {
                RunPhase::Failed
            },
        );

        info!(
            status = %status,
            completed = completed.len(),
            failed = failed.len(),
            "run finished"
        );

        ExecutionResult {
            status,
            mode,
            plan: order,
            completed,
            failed,
            errors,
            results: ctx.into_results(),
            validation_error: None,
        }
    }

    /// Execute one task, turning faults and panics into failure results.
    fn run_task(&self, name: &str, ctx: &ExecutionContext) -> TaskResult {
        let task = match self.registry.lookup(name) {
            Ok(task) => task,
            Err(err) => return TaskResult::failure(err.to_string()),
        };

        debug!(task = %name, state = "executing", "task started");
        self.observer.on_task_start(name);

        let result = invoke(task, ctx);

        self.observer.on_task_end(name, &result);
        result
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .field("store", &self.store)
            .finish()
    }
}

fn transition(phase: &mut RunPhase, next: RunPhase) {
    debug!(from = ?phase, to = ?next, "run phase");
    *phase = next;
}

fn invoke(task: &dyn Task, ctx: &ExecutionContext) -> TaskResult {
    match panic::catch_unwind(AssertUnwindSafe(|| task.execute(ctx))) {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => TaskResult::failure(format!("{err:#}")),
        Err(payload) => TaskResult::failure(format!("task panicked: {}", panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::errors::DependencyErrorKind;
    use crate::progress::MemoryProgressStore;
    use crate::task::FnTask;

    fn orchestrator(tasks: Vec<Box<dyn Task>>) -> Orchestrator {
        Orchestrator::new(
            TaskRegistry::from_tasks(tasks).unwrap(),
            Arc::new(MemoryProgressStore::new()),
        )
    }

    #[test]
    fn panicking_task_is_a_failure() {
        let orch = orchestrator(vec![Box::new(FnTask::new("boom", |_ctx| {
            panic!("exploded");
        }))]);

        let result = orch.execute(["boom"], ExecutionMode::Run, false);
        assert_eq!(result.status, RunStatus::Failure);
        assert!(result.errors["boom"].contains("exploded"));
    }

    #[test]
    fn later_tasks_see_earlier_results() {
        let orch = orchestrator(vec![
            Box::new(FnTask::new("a", |_ctx| {
                Ok(TaskResult::success().with_data("answer", 42))
            })),
            Box::new(
                FnTask::new("b", |ctx| {
                    let answer = ctx
                        .result("a")
                        .and_then(|r| r.get("answer"))
                        .and_then(|v| v.as_i64())
                        .ok_or_else(|| anyhow::anyhow!("missing answer"))?;
                    Ok(TaskResult::success().with_data("double", answer * 2))
                })
                .after(["a"]),
            ),
        ]);

        let result = orch.execute(["a", "b"], ExecutionMode::Run, false);
        assert!(result.is_success());
        assert_eq!(
            result.result("b").and_then(|r| r.get("double")),
            Some(&serde_json::json!(84))
        );
    }

    #[test]
    fn cancelled_run_stops_before_next_task() {
        let calls = Arc::new(AtomicUsize::new(0));
        let config = RunConfig::new(ExecutionMode::Run);
        let cancel = config.cancel.clone();

        let first_calls = calls.clone();
        let second_calls = calls.clone();
        let orch = orchestrator(vec![
            Box::new(FnTask::new("a", move |_ctx| {
                first_calls.fetch_add(1, Ordering::SeqCst);
                cancel.cancel();
                Ok(TaskResult::success())
            })),
            Box::new(FnTask::new("b", move |_ctx| {
                second_calls.fetch_add(1, Ordering::SeqCst);
                Ok(TaskResult::success())
            })),
        ]);

        let result = orch.execute_with(["a", "b"], config);
        assert_eq!(result.status, RunStatus::Partial);
        assert_eq!(result.completed, vec!["a".to_string()]);
        assert_eq!(result.failed, vec!["b".to_string()]);
        assert_eq!(result.errors["b"], "run cancelled");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn validation_failure_runs_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let orch = orchestrator(vec![Box::new(FnTask::new("a", move |_ctx| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(TaskResult::success())
        }))]);

        let result = orch.execute(["a", "missing"], ExecutionMode::Run, false);
        assert_eq!(result.status, RunStatus::Failure);
        assert_eq!(
            result.validation_error.as_ref().map(|e| e.kind),
            Some(DependencyErrorKind::TaskNotFound)
        );
        assert!(result.errors.contains_key("missing"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn resume_flag_forces_resume_mode() {
        let orch = orchestrator(vec![Box::new(FnTask::new("a", |ctx| {
            Ok(TaskResult::success().with_data("resume", ctx.is_resume()))
        }))]);

        let result = orch.execute(["a"], ExecutionMode::Run, true);
        assert_eq!(result.mode, ExecutionMode::Resume);
        assert_eq!(
            result.result("a").and_then(|r| r.get("resume")),
            Some(&serde_json::json!(true))
        );
    }
}
