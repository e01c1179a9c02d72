// tests/resumable_iteration.rs

use std::collections::HashSet;
use std::sync::Arc;

use taskseq::engine::{ExecutionMode, Orchestrator, RunConfig, RunStatus};
use taskseq::progress::{FileProgressStore, ProgressStatus, ProgressStore, ResumableIterator};
use taskseq::task::Iterating;
use taskseq_test_utils::{ItemProbe, RecordingObserver, init_tracing, memory_store, registry};

fn collection_orchestrator(probe: &ItemProbe, store: Arc<dyn ProgressStore>) -> Orchestrator {
    Orchestrator::new(registry(vec![Box::new(Iterating::new(probe.clone()))]), store)
}

#[test]
fn interrupted_run_resumes_with_remaining_items_only() {
    init_tracing();

    let store = memory_store();
    let probe = ItemProbe::new("collect", 100);
    let orch = collection_orchestrator(&probe, store.clone());

    // First run dies on item 41, after 40 items were marked.
    probe.set_fail_on(Some(41));
    let first = orch.execute(["collect"], ExecutionMode::Run, false);
    assert_eq!(first.status, RunStatus::Failure);
    assert_eq!(probe.processed().len(), 40);

    let stored = store.load("collect").unwrap().unwrap();
    assert_eq!(stored.status, ProgressStatus::Failed);
    assert_eq!(stored.processed_items(), 40);

    probe.set_fail_on(None);
    let second = orch.execute(["collect"], ExecutionMode::Run, true);
    assert!(second.is_success());

    let processed = probe.processed();
    assert_eq!(processed.len(), 100);
    let unique: HashSet<u32> = processed.iter().copied().collect();
    assert_eq!(unique.len(), 100);
    assert_eq!(&processed[40..], (41..=100).collect::<Vec<_>>().as_slice());

    let payload = second.result("collect").unwrap();
    assert_eq!(payload.get("processed"), Some(&serde_json::json!(60)));
    assert_eq!(payload.get("skipped"), Some(&serde_json::json!(40)));
    assert_eq!(payload.get("total"), Some(&serde_json::json!(100)));

    let done = store.load("collect").unwrap().unwrap();
    assert_eq!(done.status, ProgressStatus::Completed);
    assert_eq!(done.processed_items(), 100);
}

#[test]
fn run_mode_starts_fresh() {
    init_tracing();

    let store = memory_store();
    let probe = ItemProbe::new("collect", 5);
    let orch = collection_orchestrator(&probe, store);

    assert!(orch.execute(["collect"], ExecutionMode::Run, false).is_success());
    assert!(orch.execute(["collect"], ExecutionMode::Run, false).is_success());

    assert_eq!(probe.processed().len(), 10);
}

#[test]
fn resume_after_completion_processes_nothing() {
    init_tracing();

    let store = memory_store();
    let probe = ItemProbe::new("collect", 3);
    let orch = collection_orchestrator(&probe, store);

    assert!(orch.execute(["collect"], ExecutionMode::Run, false).is_success());
    let again = orch.execute(["collect"], ExecutionMode::Resume, false);

    assert!(again.is_success());
    assert_eq!(probe.processed().len(), 3);
    assert_eq!(
        again.result("collect").unwrap().get("skipped"),
        Some(&serde_json::json!(3))
    );
}

#[test]
fn failing_item_reports_payload() {
    init_tracing();

    let probe = ItemProbe::new("collect", 4);
    probe.set_fail_on(Some(3));
    let orch = collection_orchestrator(&probe, memory_store());

    let result = orch.execute(["collect"], ExecutionMode::Run, false);
    let failed = result.result("collect").unwrap();

    assert!(!failed.is_success());
    assert_eq!(failed.get("failed_item"), Some(&serde_json::json!("item-3")));
    assert_eq!(failed.get("processed"), Some(&serde_json::json!(2)));
    assert!(result.errors["collect"].contains("item 3 exploded"));
}

#[test]
fn cancellation_between_items_stops_the_task() {
    init_tracing();

    let probe = ItemProbe::new("collect", 10);
    let orch = collection_orchestrator(&probe, memory_store());
    let config = RunConfig::new(ExecutionMode::Run);
    config.cancel.cancel();

    let result = orch.execute_with(["collect"], config);

    assert_eq!(result.status, RunStatus::Failure);
    assert_eq!(result.errors["collect"], "run cancelled");
    assert!(probe.processed().is_empty());
}

#[test]
fn observer_sees_each_processed_item() {
    init_tracing();

    let observer = RecordingObserver::new();
    let probe = ItemProbe::new("collect", 2);
    let orch = collection_orchestrator(&probe, memory_store()).with_observer(observer.clone());

    orch.execute(["collect"], ExecutionMode::Run, false);

    assert_eq!(
        observer.events(),
        vec![
            "start:collect",
            "item:collect:item-1",
            "item:collect:item-2",
            "end:collect:ok"
        ]
    );
}

#[test]
fn file_store_resumes_across_store_instances() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("progress.json");
    let items: Vec<u32> = (1..=10).collect();

    {
        let store: Arc<dyn ProgressStore> = Arc::new(FileProgressStore::new(&path));
        let mut iter =
            ResumableIterator::new(items.clone(), |n| n.to_string(), "t", store).unwrap();
        for _ in 0..4 {
            let item = iter.next().unwrap();
            iter.mark_done(&item).unwrap();
        }
        // Yielded but never marked: must come back on resume.
        let _in_flight = iter.next().unwrap();
    }

    let store: Arc<dyn ProgressStore> = Arc::new(FileProgressStore::new(&path));
    let remaining: Vec<u32> =
        ResumableIterator::new(items, |n| n.to_string(), "t", store).unwrap().collect();
    assert_eq!(remaining, (5..=10).collect::<Vec<_>>());
}
