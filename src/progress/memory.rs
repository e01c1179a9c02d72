use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::engine::TaskName;
use crate::errors::ProgressError;

use super::{
    ProgressOp, ProgressStore, TaskProgress, apply_to_map, check_name, check_op, check_record,
};

/// Stores progress records in memory only.
///
/// Useful for tests and for runs that do not need to survive the process.
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    records: Mutex<BTreeMap<TaskName, TaskProgress>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> Result<MutexGuard<'_, BTreeMap<TaskName, TaskProgress>>, ProgressError> {
        self.records.lock().map_err(|_| ProgressError::Poisoned)
    }

    /// Copy of every record currently held.
    pub fn snapshot(&self) -> Result<BTreeMap<TaskName, TaskProgress>, ProgressError> {
        Ok(self.records()?.clone())
    }

    pub fn len(&self) -> usize {
        self.records().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProgressStore for MemoryProgressStore {
    fn save(&self, task_name: &str, progress: &TaskProgress) -> Result<(), ProgressError> {
        check_record(task_name, progress)?;
        self.records()?
            .insert(task_name.to_string(), progress.clone());
        debug!(task = %task_name, processed = progress.processed_items(), "saved progress (memory)");
        Ok(())
    }

    fn load(&self, task_name: &str) -> Result<Option<TaskProgress>, ProgressError> {
        check_name(task_name)?;
        Ok(self.records()?.get(task_name).cloned())
    }

    fn mark_completed(&self, task_name: &str) -> Result<(), ProgressError> {
        check_name(task_name)?;
        apply_to_map(
            &mut *self.records()?,
            &ProgressOp::MarkCompleted(task_name.to_string()),
        );
        debug!(task = %task_name, "marked task completed (memory)");
        Ok(())
    }

    fn clear(&self, task_name: &str) -> Result<(), ProgressError> {
        check_name(task_name)?;
        if self.records()?.remove(task_name).is_some() {
            debug!(task = %task_name, "cleared progress (memory)");
        }
        Ok(())
    }

    /// Validates the whole batch, then applies it under a single lock.
    fn apply_batch(&self, ops: &[ProgressOp]) -> Result<(), ProgressError> {
        for op in ops {
            check_op(op)?;
        }
        let mut records = self.records()?;
        for op in ops {
            apply_to_map(&mut records, op);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressStatus;

    #[test]
    fn mark_completed_creates_missing_record() {
        let store = MemoryProgressStore::new();
        store.mark_completed("t").unwrap();

        let progress = store.load("t").unwrap().unwrap();
        assert_eq!(progress.status, ProgressStatus::Completed);
        assert!(progress.completed_at.is_some());
    }

    #[test]
    fn mark_completed_is_idempotent() {
        let store = MemoryProgressStore::new();
        let mut progress = TaskProgress::started("t");
        progress.record_processed("x");
        store.save("t", &progress).unwrap();

        store.mark_completed("t").unwrap();
        store.mark_completed("t").unwrap();

        let loaded = store.load("t").unwrap().unwrap();
        assert_eq!(loaded.status, ProgressStatus::Completed);
        assert!(loaded.is_processed("x"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn clear_is_idempotent() {
        let store = MemoryProgressStore::new();
        store.clear("missing").unwrap();
        store.save("t", &TaskProgress::new("t")).unwrap();
        store.clear("t").unwrap();
        store.clear("t").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn empty_names_are_rejected() {
        let store = MemoryProgressStore::new();
        assert!(matches!(store.load(""), Err(ProgressError::EmptyTaskName)));
        assert!(matches!(
            store.mark_completed(""),
            Err(ProgressError::EmptyTaskName)
        ));
        assert!(matches!(store.clear(""), Err(ProgressError::EmptyTaskName)));
    }

    #[test]
    fn invalid_batch_writes_nothing() {
        let store = MemoryProgressStore::new();
        let ops = vec![
            ProgressOp::Save(TaskProgress::new("a")),
            ProgressOp::Clear(String::new()),
        ];
        assert!(store.apply_batch(&ops).is_err());
        assert!(store.is_empty());
    }
}
