use tracing::{debug, warn};

use crate::engine::{ExecutionContext, TaskName, TaskResult};
use crate::task::{Task, open_iterator};

/// A task that processes a finite collection of identifiable items.
pub trait IterableTask: Send + Sync {
    type Item;

    fn name(&self) -> &str;

    fn depends_on(&self) -> Vec<TaskName> {
        Vec::new()
    }

    /// The full collection for this run, in processing order.
    fn get_items(&self, ctx: &ExecutionContext) -> anyhow::Result<Vec<Self::Item>>;

    /// Stable identity of an item across runs.
    fn item_id(&self, item: &Self::Item) -> String;

    fn execute_for_item(&self, item: &Self::Item, ctx: &ExecutionContext) -> anyhow::Result<()>;
}

/// Runs an [`IterableTask`] item by item, persisting progress after each one.
///
/// The first item fault stops the task: the store keeps what was processed so
/// a `resume` run picks up from the failing item.
#[derive(Debug)]
pub struct Iterating<T> {
    inner: T,
}

impl<T: IterableTask> Iterating<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: IterableTask> Task for Iterating<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn depends_on(&self) -> Vec<TaskName> {
        self.inner.depends_on()
    }

    fn execute(&self, ctx: &ExecutionContext) -> anyhow::Result<TaskResult> {
        let name = self.inner.name();
        let items = self.inner.get_items(ctx)?;
        let total = items.len();
        let mut iter = open_iterator(items, |item| self.inner.item_id(item), name, ctx)?;

        let mut processed = 0usize;
        while let Some(item) = iter.next() {
            if ctx.is_cancelled() {
                warn!(task = %name, processed, "cancelled between items");
                iter.fail("cancelled")?;
                return Ok(TaskResult::failure("cancelled")
                    .with_data("processed", processed)
                    .with_data("skipped", iter.skipped())
                    .with_data("total", total));
            }

            if let Err(err) = self.inner.execute_for_item(&item, ctx) {
                let item_id = iter.item_id(&item);
                let message = format!("item '{item_id}' failed: {err:#}");
                warn!(task = %name, item = %item_id, error = %err, "item failed; stopping task");
                iter.fail(message.clone())?;
                return Ok(TaskResult::failure(message)
                    .with_data("processed", processed)
                    .with_data("skipped", iter.skipped())
                    .with_data("total", total)
                    .with_data("failed_item", item_id));
            }

            iter.mark_done(&item)?;
            processed += 1;
        }

        iter.complete()?;
        debug!(task = %name, processed, skipped = iter.skipped(), total, "collection task finished");

        Ok(TaskResult::success()
            .with_data("processed", processed)
            .with_data("skipped", iter.skipped())
            .with_data("total", total))
    }
}
