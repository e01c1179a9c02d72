// src/progress/mod.rs

//! Progress tracking contract.
//!
//! The engine never talks to a concrete storage backend. Tasks persist
//! per-task and per-item progress through a [`ProgressStore`], which makes a
//! run resumable: a later run in `resume` mode reads the records back and skips
//! the work that already completed.
//!
//! - [`memory`] keeps records in a process-local map.
//! - [`file`] keeps records in a JSON document on disk.
//! - [`iterator`] contains [`ResumableIterator`], which wraps a collection and
//!   skips items that a previous run already marked as processed.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Debug};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::TaskName;
use crate::errors::ProgressError;

pub mod file;
pub mod iterator;
pub mod memory;

pub use file::FileProgressStore;
pub use iterator::ResumableIterator;
pub use memory::MemoryProgressStore;

/// Lifecycle of a persisted progress record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressStatus::Pending => f.write_str("pending"),
            ProgressStatus::InProgress => f.write_str("in_progress"),
            ProgressStatus::Completed => f.write_str("completed"),
            ProgressStatus::Failed => f.write_str("failed"),
        }
    }
}

/// Persisted progress of a single task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    pub task_name: TaskName,
    #[serde(default)]
    pub status: ProgressStatus,
    /// Identities of the items this task has finished processing.
    #[serde(default)]
    pub processed_ids: BTreeSet<String>,
    #[serde(default)]
    pub total_items: Option<usize>,
    #[serde(default)]
    pub last_processed_id: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl TaskProgress {
    pub fn new(task_name: impl Into<TaskName>) -> Self {
        Self {
            task_name: task_name.into(),
            status: ProgressStatus::Pending,
            processed_ids: BTreeSet::new(),
            total_items: None,
            last_processed_id: None,
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }

    /// A record for a task that has just started.
    pub fn started(task_name: impl Into<TaskName>) -> Self {
        let mut progress = Self::new(task_name);
        progress.mark_started();
        progress
    }

    pub fn processed_items(&self) -> usize {
        self.processed_ids.len()
    }

    pub fn is_processed(&self, item_id: &str) -> bool {
        self.processed_ids.contains(item_id)
    }

    /// Record an item as processed. Returns `false` if it already was.
    pub fn record_processed(&mut self, item_id: impl Into<String>) -> bool {
        let item_id = item_id.into();
        self.last_processed_id = Some(item_id.clone());
        self.processed_ids.insert(item_id)
    }

    pub fn mark_started(&mut self) {
        self.status = ProgressStatus::InProgress;
        self.started_at.get_or_insert_with(Utc::now);
        self.completed_at = None;
        self.error_message = None;
    }

    pub fn mark_completed(&mut self) {
        let now = Utc::now();
        self.status = ProgressStatus::Completed;
        self.completed_at = Some(now);
        self.started_at.get_or_insert(now);
        self.error_message = None;
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = ProgressStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error_message = Some(message.into());
    }

    /// Check the record's internal consistency.
    pub fn validate(&self) -> Result<(), ProgressError> {
        if self.task_name.is_empty() {
            return Err(ProgressError::EmptyTaskName);
        }
        if let Some(total) = self.total_items {
            if self.processed_items() > total {
                return Err(ProgressError::InvalidRecord {
                    task: self.task_name.clone(),
                    reason: format!(
                        "processed items ({}) exceed total items ({})",
                        self.processed_items(),
                        total
                    ),
                });
            }
        }
        Ok(())
    }
}

/// A single write against a progress store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressOp {
    Save(TaskProgress),
    MarkCompleted(TaskName),
    Clear(TaskName),
}

impl ProgressOp {
    pub fn task_name(&self) -> &str {
        match self {
            ProgressOp::Save(progress) => &progress.task_name,
            ProgressOp::MarkCompleted(name) | ProgressOp::Clear(name) => name,
        }
    }
}

/// Abstract persistence boundary for progress records.
///
/// Implementations must make each individual write atomic with respect to
/// concurrent readers of the same key. The contract assumes a single writer
/// per task name during a run.
pub trait ProgressStore: Send + Sync + Debug {
    /// Upsert the record for `task_name`.
    fn save(&self, task_name: &str, progress: &TaskProgress) -> Result<(), ProgressError>;

    fn load(&self, task_name: &str) -> Result<Option<TaskProgress>, ProgressError>;

    /// Terminal transition; creates a completed record if none exists.
    /// Idempotent.
    fn mark_completed(&self, task_name: &str) -> Result<(), ProgressError>;

    /// Remove the record for `task_name`. Idempotent.
    fn clear(&self, task_name: &str) -> Result<(), ProgressError>;

    /// Apply a batch of writes as a unit.
    ///
    /// The default applies the operations one by one, which is only
    /// best-effort atomic. Backends that can do better override it.
    fn apply_batch(&self, ops: &[ProgressOp]) -> Result<(), ProgressError> {
        for op in ops {
            match op {
                ProgressOp::Save(progress) => self.save(&progress.task_name, progress)?,
                ProgressOp::MarkCompleted(name) => self.mark_completed(name)?,
                ProgressOp::Clear(name) => self.clear(name)?,
            }
        }
        Ok(())
    }
}

impl dyn ProgressStore {
    /// Open a scoped transaction against this store.
    pub fn transaction(&self) -> ProgressTransaction<'_> {
        ProgressTransaction::begin(self)
    }

    /// Run `f` inside a transaction: commit when it returns `Ok`, discard
    /// every staged write when it returns `Err` or unwinds.
    pub fn with_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut ProgressTransaction<'_>) -> Result<T, E>,
        E: From<ProgressError>,
    {
        let mut tx = self.transaction();
        let value = f(&mut tx)?;
        tx.commit()?;
        Ok(value)
    }
}

/// Staged writes against a [`ProgressStore`].
///
/// Writes are buffered in the guard and reach the store only through
/// [`ProgressTransaction::commit`], as a single [`ProgressStore::apply_batch`]
/// call. Dropping the guard without committing discards them, so every exit
/// path (early return, `?`, panic) releases the scope.
pub struct ProgressTransaction<'a> {
    store: &'a dyn ProgressStore,
    staged: Vec<ProgressOp>,
    committed: bool,
}

impl<'a> ProgressTransaction<'a> {
    pub fn begin(store: &'a dyn ProgressStore) -> Self {
        Self {
            store,
            staged: Vec::new(),
            committed: false,
        }
    }

    pub fn save(&mut self, task_name: &str, progress: &TaskProgress) -> Result<(), ProgressError> {
        check_record(task_name, progress)?;
        self.staged.push(ProgressOp::Save(progress.clone()));
        Ok(())
    }

    pub fn mark_completed(&mut self, task_name: &str) -> Result<(), ProgressError> {
        check_name(task_name)?;
        self.staged.push(ProgressOp::MarkCompleted(task_name.to_string()));
        Ok(())
    }

    pub fn clear(&mut self, task_name: &str) -> Result<(), ProgressError> {
        check_name(task_name)?;
        self.staged.push(ProgressOp::Clear(task_name.to_string()));
        Ok(())
    }

    /// Read a record as it would look after commit.
    pub fn load(&self, task_name: &str) -> Result<Option<TaskProgress>, ProgressError> {
        let mut view = BTreeMap::new();
        if let Some(progress) = self.store.load(task_name)? {
            view.insert(task_name.to_string(), progress);
        }
        for op in self.staged.iter().filter(|op| op.task_name() == task_name) {
            apply_to_map(&mut view, op);
        }
        Ok(view.remove(task_name))
    }

    pub fn staged(&self) -> &[ProgressOp] {
        &self.staged
    }

    pub fn commit(mut self) -> Result<(), ProgressError> {
        self.committed = true;
        let ops = std::mem::take(&mut self.staged);
        debug!(ops = ops.len(), "committing progress transaction");
        self.store.apply_batch(&ops)
    }

    /// Explicitly discard staged writes.
    pub fn rollback(self) {}
}

impl Drop for ProgressTransaction<'_> {
    fn drop(&mut self) {
        if !self.committed && !self.staged.is_empty() {
            debug!(
                discarded = self.staged.len(),
                "progress transaction dropped without commit; discarding staged writes"
            );
        }
    }
}

pub(crate) fn check_name(task_name: &str) -> Result<(), ProgressError> {
    if task_name.is_empty() {
        return Err(ProgressError::EmptyTaskName);
    }
    Ok(())
}

/// Validate a record before it is written under `task_name`.
pub(crate) fn check_record(task_name: &str, progress: &TaskProgress) -> Result<(), ProgressError> {
    check_name(task_name)?;
    if progress.task_name != task_name {
        return Err(ProgressError::NameMismatch {
            expected: task_name.to_string(),
            found: progress.task_name.clone(),
        });
    }
    progress.validate()
}

pub(crate) fn check_op(op: &ProgressOp) -> Result<(), ProgressError> {
    match op {
        ProgressOp::Save(progress) => check_record(&progress.task_name, progress),
        ProgressOp::MarkCompleted(name) | ProgressOp::Clear(name) => check_name(name),
    }
}

/// Apply one write to an in-memory map of records. Shared by the backends.
pub(crate) fn apply_to_map(map: &mut BTreeMap<TaskName, TaskProgress>, op: &ProgressOp) {
    match op {
        ProgressOp::Save(progress) => {
            map.insert(progress.task_name.clone(), progress.clone());
        }
        ProgressOp::MarkCompleted(name) => {
            map.entry(name.clone())
                .or_insert_with(|| TaskProgress::new(name.clone()))
                .mark_completed();
        }
        ProgressOp::Clear(name) => {
            map.remove(name);
        }
    }
}
