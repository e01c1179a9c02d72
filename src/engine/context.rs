// src/engine/context.rs

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;

use crate::engine::{ExecutionObserver, TaskName, TaskResult};
use crate::progress::ProgressStore;
use crate::types::ExecutionMode;

/// Shared cancellation signal for a run.
///
/// Cloning yields a handle to the same flag, so a signal handler can hold one
/// clone while the run consults another.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Typed run configuration seen by every task.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub mode: ExecutionMode,
    /// Free-form caller options (e.g. from `--set KEY=VALUE`).
    pub options: BTreeMap<String, String>,
    pub cancel: CancelFlag,
}

impl RunConfig {
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn resume(&self) -> bool {
        self.mode == ExecutionMode::Resume
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(|s| s.as_str())
    }
}

/// Per-run state passed to every task.
///
/// Tasks only read from it; the orchestrator appends each task's result after
/// the task returns, so a task sees the results of everything that ran before
/// it.
pub struct ExecutionContext {
    order: Vec<TaskName>,
    results: IndexMap<TaskName, TaskResult>,
    store: Arc<dyn ProgressStore>,
    observer: Arc<dyn ExecutionObserver>,
    config: RunConfig,
}

impl ExecutionContext {
    pub fn new(
        order: Vec<TaskName>,
        store: Arc<dyn ProgressStore>,
        observer: Arc<dyn ExecutionObserver>,
        config: RunConfig,
    ) -> Self {
        Self {
            order,
            results: IndexMap::new(),
            store,
            observer,
            config,
        }
    }

    pub fn result(&self, task: &str) -> Option<&TaskResult> {
        self.results.get(task)
    }

    /// Results recorded so far, in completion order.
    pub fn results(&self) -> &IndexMap<TaskName, TaskResult> {
        &self.results
    }

    pub fn store(&self) -> &Arc<dyn ProgressStore> {
        &self.store
    }

    pub fn observer(&self) -> &Arc<dyn ExecutionObserver> {
        &self.observer
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn mode(&self) -> ExecutionMode {
        self.config.mode
    }

    pub fn is_resume(&self) -> bool {
        self.config.resume()
    }

    pub fn is_cancelled(&self) -> bool {
        self.config.cancel.is_cancelled()
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.config.option(key)
    }

    /// The full order of the run this context belongs to.
    pub fn task_order(&self) -> &[TaskName] {
        &self.order
    }

    /// Store a task's result. Results are never replaced.
    pub(crate) fn record(&mut self, task: TaskName, result: TaskResult) {
        self.results.entry(task).or_insert(result);
    }

    pub(crate) fn into_results(self) -> IndexMap<TaskName, TaskResult> {
        self.results
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("order", &self.order)
            .field("results", &self.results.keys().collect::<Vec<_>>())
            .field("store", &self.store)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NoopObserver;
    use crate::progress::MemoryProgressStore;

    fn context(config: RunConfig) -> ExecutionContext {
        ExecutionContext::new(
            vec!["a".into(), "b".into()],
            Arc::new(MemoryProgressStore::new()),
            Arc::new(NoopObserver),
            config,
        )
    }

    #[test]
    fn cancel_flag_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let ctx = context(RunConfig::default().with_cancel_flag(flag.clone()));
        assert!(!ctx.is_cancelled());
        flag.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn results_are_append_only() {
        let mut ctx = context(RunConfig::new(ExecutionMode::Resume));
        ctx.record("a".into(), TaskResult::success().with_data("n", 1));
        ctx.record("a".into(), TaskResult::failure("late"));

        assert!(ctx.result("a").unwrap().is_success());
        assert!(ctx.is_resume());
        assert_eq!(ctx.task_order(), ["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn options_are_readable() {
        let ctx = context(RunConfig::default().with_option("env", "prod"));
        assert_eq!(ctx.option("env"), Some("prod"));
        assert_eq!(ctx.option("missing"), None);
        assert_eq!(ctx.mode(), ExecutionMode::Run);
    }
}
