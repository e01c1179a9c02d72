// tests/progress_store.rs

use std::sync::Arc;

use taskseq::errors::ProgressError;
use taskseq::progress::{
    FileProgressStore, MemoryProgressStore, ProgressStatus, ProgressStore, TaskProgress,
};
use taskseq_test_utils::init_tracing;

/// Run the same check against both backends.
fn each_backend(check: impl Fn(Arc<dyn ProgressStore>)) {
    init_tracing();
    check(Arc::new(MemoryProgressStore::new()));

    let dir = tempfile::tempdir().unwrap();
    check(Arc::new(FileProgressStore::new(dir.path().join("progress.json"))));
}

fn record(name: &str, ids: &[&str]) -> TaskProgress {
    let mut progress = TaskProgress::started(name);
    for id in ids {
        progress.record_processed(*id);
    }
    progress
}

#[test]
fn save_then_load_returns_the_record() {
    each_backend(|store| {
        assert_eq!(store.load("t").unwrap(), None);

        let progress = record("t", &["a", "b"]);
        store.save("t", &progress).unwrap();

        let loaded = store.load("t").unwrap().unwrap();
        assert_eq!(loaded.status, ProgressStatus::InProgress);
        assert_eq!(loaded.processed_items(), 2);
        assert!(loaded.is_processed("a"));
        assert_eq!(loaded.last_processed_id.as_deref(), Some("b"));
    });
}

#[test]
fn mark_completed_and_clear_are_idempotent() {
    each_backend(|store| {
        store.save("t", &record("t", &["a"])).unwrap();
        store.mark_completed("t").unwrap();
        store.mark_completed("t").unwrap();

        let done = store.load("t").unwrap().unwrap();
        assert_eq!(done.status, ProgressStatus::Completed);
        assert!(done.completed_at.is_some());
        assert!(done.is_processed("a"));

        store.clear("t").unwrap();
        store.clear("t").unwrap();
        assert_eq!(store.load("t").unwrap(), None);
    });
}

#[test]
fn empty_names_and_mismatches_are_rejected() {
    each_backend(|store| {
        assert!(matches!(
            store.save("", &TaskProgress::new("")),
            Err(ProgressError::EmptyTaskName)
        ));
        assert!(matches!(store.load(""), Err(ProgressError::EmptyTaskName)));
        assert!(matches!(
            store.save("a", &TaskProgress::new("b")),
            Err(ProgressError::NameMismatch { .. })
        ));
    });
}

#[test]
fn transaction_commits_all_writes_together() {
    each_backend(|store| {
        let mut tx = store.transaction();
        tx.save("a", &record("a", &["1"])).unwrap();
        tx.save("b", &record("b", &["x", "y"])).unwrap();
        tx.mark_completed("a").unwrap();

        // Nothing is visible before commit, except through the guard.
        assert_eq!(store.load("a").unwrap(), None);
        assert_eq!(
            tx.load("a").unwrap().map(|p| p.status),
            Some(ProgressStatus::Completed)
        );

        tx.commit().unwrap();

        assert_eq!(
            store.load("a").unwrap().unwrap().status,
            ProgressStatus::Completed
        );
        assert_eq!(store.load("b").unwrap().unwrap().processed_items(), 2);
    });
}

#[test]
fn dropped_transaction_discards_writes() {
    each_backend(|store| {
        {
            let mut tx = store.transaction();
            tx.save("a", &record("a", &["1"])).unwrap();
        }
        assert_eq!(store.load("a").unwrap(), None);

        let mut tx = store.transaction();
        tx.save("a", &record("a", &["1"])).unwrap();
        tx.rollback();
        assert_eq!(store.load("a").unwrap(), None);
    });
}

#[test]
fn with_transaction_rolls_back_on_error() {
    each_backend(|store| {
        store.save("keep", &record("keep", &["1"])).unwrap();

        let outcome: Result<(), anyhow::Error> = store.with_transaction(|tx| {
            tx.clear("keep")?;
            tx.save("new", &record("new", &["x"]))?;
            anyhow::bail!("abort the batch")
        });

        assert!(outcome.is_err());
        assert!(store.load("keep").unwrap().is_some());
        assert_eq!(store.load("new").unwrap(), None);

        let count = store
            .with_transaction(|tx| -> Result<usize, ProgressError> {
                tx.clear("keep")?;
                tx.save("new", &record("new", &["x"]))?;
                Ok(tx.staged().len())
            })
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(store.load("keep").unwrap(), None);
        assert!(store.load("new").unwrap().is_some());
    });
}

#[test]
fn invalid_staged_write_fails_immediately() {
    each_backend(|store| {
        let mut tx = store.transaction();
        assert!(tx.mark_completed("").is_err());
        assert!(tx.staged().is_empty());
    });
}

#[test]
fn file_store_survives_reopen_and_keeps_other_tasks() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("progress.json");

    {
        let store = FileProgressStore::new(&path);
        store.save("a", &record("a", &["1", "2"])).unwrap();
        store.save("b", &record("b", &["z"])).unwrap();
        store.clear("b").unwrap();
    }

    let reopened = FileProgressStore::new(&path);
    let all = reopened.load_all().unwrap();
    assert_eq!(all.keys().collect::<Vec<_>>(), vec!["a"]);
    assert_eq!(all["a"].processed_items(), 2);
}

#[test]
fn corrupt_file_is_an_error_not_a_reset() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("progress.json");
    std::fs::write(&path, "{ not json").unwrap();

    let store = FileProgressStore::new(&path);
    assert!(matches!(store.load("a"), Err(ProgressError::Serialization(_))));
}
