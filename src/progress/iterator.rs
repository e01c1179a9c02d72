use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::engine::{ExecutionObserver, TaskName};
use crate::errors::ProgressError;

use super::{ProgressStatus, ProgressStore, TaskProgress};

/// Iterator over a collection that skips items a previous run already
/// processed.
///
/// On construction the persisted record for the task is loaded and its
/// processed set is narrowed to identities present in `items`. Iteration
/// yields, in input order, every item whose identity is not in that set.
/// Callers persist progress after each successful item with
/// [`ResumableIterator::mark_done`], so an interrupted run loses at most the
/// item that was in flight.
pub struct ResumableIterator<T, F>
where
    F: Fn(&T) -> String,
{
    task_name: TaskName,
    items: std::vec::IntoIter<T>,
    id_of: F,
    store: Arc<dyn ProgressStore>,
    observer: Option<Arc<dyn ExecutionObserver>>,
    progress: TaskProgress,
    skipped: usize,
}

impl<T, F> ResumableIterator<T, F>
where
    F: Fn(&T) -> String,
{
    /// Wrap `items`, honouring whatever progress the store holds for
    /// `task_name`.
    pub fn new(
        items: Vec<T>,
        id_of: F,
        task_name: impl Into<TaskName>,
        store: Arc<dyn ProgressStore>,
    ) -> Result<Self, ProgressError> {
        let task_name = task_name.into();
        if task_name.is_empty() {
            return Err(ProgressError::EmptyTaskName);
        }

        let mut progress = store
            .load(&task_name)?
            .unwrap_or_else(|| TaskProgress::new(task_name.clone()));

        let current: HashSet<String> = items.iter().map(&id_of).collect();
        let before = progress.processed_items();
        progress.processed_ids.retain(|id| current.contains(id));
        if progress.processed_items() < before {
            debug!(
                task = %task_name,
                dropped = before - progress.processed_items(),
                "ignoring processed ids that are no longer in the collection"
            );
        }
        progress.total_items = Some(items.len());

        debug!(
            task = %task_name,
            total = items.len(),
            already_processed = progress.processed_items(),
            "resumable iterator ready"
        );

        Ok(Self {
            task_name,
            items: items.into_iter(),
            id_of,
            store,
            observer: None,
            progress,
            skipped: 0,
        })
    }

    /// Wrap `items` after discarding any stored progress for `task_name`.
    pub fn fresh(
        items: Vec<T>,
        id_of: F,
        task_name: impl Into<TaskName>,
        store: Arc<dyn ProgressStore>,
    ) -> Result<Self, ProgressError> {
        let task_name = task_name.into();
        if task_name.is_empty() {
            return Err(ProgressError::EmptyTaskName);
        }
        store.clear(&task_name)?;
        Self::new(items, id_of, task_name, store)
    }

    /// Report each persisted item to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    pub fn progress(&self) -> &TaskProgress {
        &self.progress
    }

    pub fn item_id(&self, item: &T) -> String {
        (self.id_of)(item)
    }

    pub fn is_processed(&self, item: &T) -> bool {
        self.progress.is_processed(&(self.id_of)(item))
    }

    /// Items counted as processed so far, across runs.
    pub fn processed_count(&self) -> usize {
        self.progress.processed_items()
    }

    /// Items skipped during this iteration because they were already done.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Items not yet yielded that still need processing.
    pub fn remaining(&self) -> usize {
        self.items
            .as_slice()
            .iter()
            .filter(|item| !self.is_processed(item))
            .count()
    }

    /// Persist `item` as processed.
    ///
    /// The record is written before this returns, so a crash right after
    /// leaves the item marked.
    pub fn mark_done(&mut self, item: &T) -> Result<(), ProgressError> {
        let id = (self.id_of)(item);
        if self.progress.status != ProgressStatus::InProgress {
            self.progress.mark_started();
        }
        self.progress.record_processed(id.clone());
        self.store.save(&self.task_name, &self.progress)?;
        trace!(task = %self.task_name, item = %id, "item marked processed");

        if let Some(observer) = &self.observer {
            observer.on_item_processed(&self.task_name, &id);
        }
        Ok(())
    }

    /// Terminal success for the whole collection.
    pub fn complete(&mut self) -> Result<(), ProgressError> {
        self.progress.mark_completed();
        self.store.save(&self.task_name, &self.progress)?;
        self.store.mark_completed(&self.task_name)?;
        debug!(
            task = %self.task_name,
            processed = self.progress.processed_items(),
            skipped = self.skipped,
            "collection completed"
        );
        Ok(())
    }

    /// Terminal failure; processed items stay recorded for a later resume.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), ProgressError> {
        self.progress.mark_failed(message);
        self.store.save(&self.task_name, &self.progress)
    }
}

impl<T, F> Iterator for ResumableIterator<T, F>
where
    F: Fn(&T) -> String,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        loop {
            let item = self.items.next()?;
            let id = (self.id_of)(&item);
            if self.progress.is_processed(&id) {
                self.skipped += 1;
                trace!(task = %self.task_name, item = %id, "skipping processed item");
                continue;
            }
            return Some(item);
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.items.size_hint().1)
    }
}

impl<T, F> fmt::Debug for ResumableIterator<T, F>
where
    F: Fn(&T) -> String,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResumableIterator")
            .field("task_name", &self.task_name)
            .field("pending", &self.items.len())
            .field("processed", &self.progress.processed_items())
            .field("skipped", &self.skipped)
            .finish()
    }
}
