#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail};
use taskseq::engine::{ExecutionContext, ExecutionObserver, Orchestrator, TaskName, TaskResult};
use taskseq::progress::{MemoryProgressStore, ProgressStore};
use taskseq::registry::TaskRegistry;
use taskseq::task::{ErrorDecision, IterableTask, ParameterizedIterableTask, Task};

/// Fresh in-memory progress store behind the trait object the engine uses.
pub fn memory_store() -> Arc<dyn ProgressStore> {
    Arc::new(MemoryProgressStore::new())
}

/// Registry from boxed tasks; panics on duplicate names.
pub fn registry(tasks: Vec<Box<dyn Task>>) -> TaskRegistry {
    TaskRegistry::from_tasks(tasks).expect("Failed to build registry from tasks")
}

pub fn orchestrator(tasks: Vec<Box<dyn Task>>, store: Arc<dyn ProgressStore>) -> Orchestrator {
    Orchestrator::new(registry(tasks), store)
}

/// What a [`ProbeTask`] does when executed.
#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    Succeed,
    /// Return a failure result.
    Fail(String),
    /// Return `Err`.
    Fault(String),
    Panic(String),
}

/// Plain task that counts its invocations.
#[derive(Debug, Clone)]
pub struct ProbeTask {
    name: TaskName,
    deps: Vec<TaskName>,
    outcome: ProbeOutcome,
    calls: Arc<AtomicUsize>,
}

impl ProbeTask {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            deps: Vec::new(),
            outcome: ProbeOutcome::Succeed,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn after(mut self, deps: &[&str]) -> Self {
        self.deps = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn with_outcome(mut self, outcome: ProbeOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn failing(self, msg: &str) -> Self {
        self.with_outcome(ProbeOutcome::Fail(msg.to_string()))
    }

    pub fn faulting(self, msg: &str) -> Self {
        self.with_outcome(ProbeOutcome::Fault(msg.to_string()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn boxed(&self) -> Box<dyn Task> {
        Box::new(self.clone())
    }
}

impl Task for ProbeTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn depends_on(&self) -> Vec<TaskName> {
        self.deps.clone()
    }

    fn execute(&self, _ctx: &ExecutionContext) -> anyhow::Result<TaskResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            ProbeOutcome::Succeed => Ok(TaskResult::success().with_data("task", self.name.clone())),
            ProbeOutcome::Fail(msg) => Ok(TaskResult::failure(msg.clone())),
            ProbeOutcome::Fault(msg) => Err(anyhow!(msg.clone())),
            ProbeOutcome::Panic(msg) => panic!("{msg}"),
        }
    }
}

/// Observer that records every event as a string such as `start:a`,
/// `end:a:ok`, `end:b:failed` or `item:c:item-1`.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl ExecutionObserver for RecordingObserver {
    fn on_task_start(&self, task: &str) {
        self.push(format!("start:{task}"));
    }

    fn on_task_end(&self, task: &str, result: &TaskResult) {
        let status = if result.is_success() { "ok" } else { "failed" };
        self.push(format!("end:{task}:{status}"));
    }

    fn on_item_processed(&self, task: &str, item_id: &str) {
        self.push(format!("item:{task}:{item_id}"));
    }
}

/// Collection task over the items `1..=count`, identified as `item-<n>`.
///
/// Clones share state, so a test can keep one handle while the registry owns
/// another.
#[derive(Debug, Clone)]
pub struct ItemProbe {
    name: TaskName,
    count: u32,
    processed: Arc<Mutex<Vec<u32>>>,
    fail_on: Arc<Mutex<Option<u32>>>,
}

impl ItemProbe {
    pub fn new(name: &str, count: u32) -> Self {
        Self {
            name: name.to_string(),
            count,
            processed: Arc::new(Mutex::new(Vec::new())),
            fail_on: Arc::new(Mutex::new(None)),
        }
    }

    /// Make the given item fault until cleared with `None`.
    pub fn set_fail_on(&self, item: Option<u32>) {
        *self.fail_on.lock().unwrap() = item;
    }

    /// Every item processed successfully, across runs, in processing order.
    pub fn processed(&self) -> Vec<u32> {
        self.processed.lock().unwrap().clone()
    }
}

impl IterableTask for ItemProbe {
    type Item = u32;

    fn name(&self) -> &str {
        &self.name
    }

    fn get_items(&self, _ctx: &ExecutionContext) -> anyhow::Result<Vec<u32>> {
        Ok((1..=self.count).collect())
    }

    fn item_id(&self, item: &u32) -> String {
        format!("item-{item}")
    }

    fn execute_for_item(&self, item: &u32, _ctx: &ExecutionContext) -> anyhow::Result<()> {
        if *self.fail_on.lock().unwrap() == Some(*item) {
            bail!("item {item} exploded");
        }
        self.processed.lock().unwrap().push(*item);
        Ok(())
    }
}

/// Parameter-driven task over `1..=count`.
///
/// `fail_times(p, n)` makes parameter `p` fault on its first `n` attempts
/// (`usize::MAX` for always); `decide(p, d)` makes `on_error` return `d` for
/// parameter `p`.
#[derive(Debug, Clone)]
pub struct ParamProbe {
    name: TaskName,
    count: u32,
    failures: HashMap<u32, usize>,
    decisions: HashMap<u32, ErrorDecision>,
    attempts: Arc<Mutex<Vec<u32>>>,
    succeeded: Arc<Mutex<Vec<u32>>>,
}

impl ParamProbe {
    pub fn new(name: &str, count: u32) -> Self {
        Self {
            name: name.to_string(),
            count,
            failures: HashMap::new(),
            decisions: HashMap::new(),
            attempts: Arc::new(Mutex::new(Vec::new())),
            succeeded: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn fail_times(mut self, param: u32, times: usize) -> Self {
        self.failures.insert(param, times);
        self
    }

    pub fn always_fail(self, param: u32) -> Self {
        self.fail_times(param, usize::MAX)
    }

    pub fn decide(mut self, param: u32, decision: ErrorDecision) -> Self {
        self.decisions.insert(param, decision);
        self
    }

    /// Every attempt, in order (a retried parameter appears repeatedly).
    pub fn attempts(&self) -> Vec<u32> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempts_for(&self, param: u32) -> usize {
        self.attempts().iter().filter(|&&p| p == param).count()
    }

    pub fn succeeded(&self) -> Vec<u32> {
        self.succeeded.lock().unwrap().clone()
    }
}

impl ParameterizedIterableTask for ParamProbe {
    type Param = u32;

    fn name(&self) -> &str {
        &self.name
    }

    fn get_parameters(&self, _ctx: &ExecutionContext) -> anyhow::Result<Vec<u32>> {
        Ok((1..=self.count).collect())
    }

    fn execute_for_parameter(&self, param: &u32, _ctx: &ExecutionContext) -> anyhow::Result<()> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push(*param);
            attempts.iter().filter(|&&p| p == *param).count()
        };
        if let Some(&times) = self.failures.get(param) {
            if attempt <= times {
                bail!("parameter {param} failed on attempt {attempt}");
            }
        }
        self.succeeded.lock().unwrap().push(*param);
        Ok(())
    }

    fn on_error(
        &self,
        param: &u32,
        _error: &anyhow::Error,
        _ctx: &ExecutionContext,
    ) -> ErrorDecision {
        self.decisions.get(param).copied().unwrap_or_default()
    }
}
