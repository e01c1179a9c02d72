use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::engine::TaskName;
use crate::errors::DependencyError;
use crate::types::ExecutionMode;

/// Whether a single task invocation succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskOutcome {
    Success,
    Failure,
}

/// Outcome of one task invocation.
///
/// The payload is visible to every task that runs later in the same run
/// through [`ExecutionContext::result`](crate::engine::ExecutionContext::result).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub outcome: TaskOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl TaskResult {
    pub fn success() -> Self {
        Self {
            outcome: TaskOutcome::Success,
            payload: None,
            error: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            outcome: TaskOutcome::Failure,
            payload: None,
            error: Some(error.into()),
            metadata: BTreeMap::new(),
        }
    }

    /// Add a payload entry.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome == TaskOutcome::Success
    }

    /// Look up a payload entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.as_ref().and_then(|p| p.get(key))
    }

    /// Error description, with a generic fallback for failures that did not
    /// carry one.
    pub fn error_message(&self) -> Option<String> {
        match (&self.outcome, &self.error) {
            (_, Some(err)) => Some(err.clone()),
            (TaskOutcome::Failure, None) => Some("task reported failure".to_string()),
            (TaskOutcome::Success, None) => None,
        }
    }
}

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every task in the order succeeded (or the dry run validated).
    Success,
    /// Some tasks completed before one failed.
    Partial,
    /// Validation failed, or the first executed task failed.
    Failure,
}

impl RunStatus {
    pub(crate) fn from_counts(completed: usize, failed: usize) -> Self {
        match (completed, failed) {
            (_, 0) => RunStatus::Success,
            (0, _) => RunStatus::Failure,
            _ => RunStatus::Partial,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => f.write_str("success"),
            RunStatus::Partial => f.write_str("partial"),
            RunStatus::Failure => f.write_str("failure"),
        }
    }
}

/// Produced once per [`Orchestrator::execute`](crate::engine::Orchestrator::execute) call.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub status: RunStatus,
    pub mode: ExecutionMode,
    /// The order the run was asked to execute.
    pub plan: Vec<TaskName>,
    pub completed: Vec<TaskName>,
    pub failed: Vec<TaskName>,
    /// Error description per failed task.
    pub errors: IndexMap<TaskName, String>,
    /// Every stored task result, in completion order.
    pub results: IndexMap<TaskName, TaskResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<DependencyError>,
}

impl ExecutionResult {
    /// Result of a run whose order failed validation.
    pub(crate) fn rejected(mode: ExecutionMode, plan: Vec<TaskName>, err: DependencyError) -> Self {
        let mut errors = IndexMap::new();
        errors.insert(err.task.clone(), err.to_string());
        Self {
            status: RunStatus::Failure,
            mode,
            plan,
            completed: Vec::new(),
            failed: Vec::new(),
            errors,
            results: IndexMap::new(),
            validation_error: Some(err),
        }
    }

    /// Result of a dry run whose order validated.
    pub(crate) fn planned(mode: ExecutionMode, plan: Vec<TaskName>) -> Self {
        Self {
            status: RunStatus::Success,
            mode,
            plan,
            completed: Vec::new(),
            failed: Vec::new(),
            errors: IndexMap::new(),
            results: IndexMap::new(),
            validation_error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    pub fn result(&self, task: &str) -> Option<&TaskResult> {
        self.results.get(task)
    }

    /// Tasks in the plan that never ran.
    pub fn not_run(&self) -> impl Iterator<Item = &str> {
        self.plan
            .iter()
            .filter(|name| !self.completed.contains(name) && !self.failed.contains(name))
            .map(|s| s.as_str())
    }

    pub fn to_json_pretty(&self) -> crate::errors::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
