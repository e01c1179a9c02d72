use crate::engine::TaskResult;

/// Hook for reporting run progress outside of the log stream.
///
/// The orchestrator calls `on_task_start` / `on_task_end` around each task it
/// executes; resumable iterators call `on_item_processed` after persisting an
/// item. Every method defaults to a no-op.
pub trait ExecutionObserver: Send + Sync {
    fn on_task_start(&self, _task: &str) {}

    fn on_task_end(&self, _task: &str, _result: &TaskResult) {}

    fn on_item_processed(&self, _task: &str, _item_id: &str) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ExecutionObserver for NoopObserver {}
