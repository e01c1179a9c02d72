// src/errors.rs

//! Crate-wide error types.
//!
//! Each component has its own error enum so callers can match on the exact
//! failure (registry misuse, dependency violations, progress storage); they
//! all fold into [`TaskseqError`] for code that only wants to propagate.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::engine::TaskName;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("task '{0}' is already registered")]
    DuplicateTask(TaskName),

    #[error("task '{0}' not found in registry")]
    NotFound(TaskName),
}

/// Reason code carried by a [`DependencyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyErrorKind {
    TaskNotFound,
    MissingDependency,
    OutOfOrder,
    CyclicDependency,
}

impl fmt::Display for DependencyErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DependencyErrorKind::TaskNotFound => "task not found",
            DependencyErrorKind::MissingDependency => "missing dependency",
            DependencyErrorKind::OutOfOrder => "out of order",
            DependencyErrorKind::CyclicDependency => "cyclic dependency",
        };
        f.write_str(s)
    }
}

/// A task order that is not a legal linearization of the declared
/// dependencies.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{kind}: {message}")]
pub struct DependencyError {
    pub kind: DependencyErrorKind,
    /// The task whose declaration (or presence in the order) is at fault.
    pub task: TaskName,
    /// Other tasks involved: the missing / misplaced dependencies, or the
    /// cycle path.
    pub related: Vec<TaskName>,
    pub message: String,
}

impl DependencyError {
    pub fn new(
        kind: DependencyErrorKind,
        task: impl Into<TaskName>,
        related: Vec<TaskName>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            task: task.into(),
            related,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ProgressError {
    #[error("task name cannot be empty")]
    EmptyTaskName,

    #[error("task name mismatch: expected '{expected}', got '{found}'")]
    NameMismatch { expected: TaskName, found: TaskName },

    #[error("invalid progress record for '{task}': {reason}")]
    InvalidRecord { task: TaskName, reason: String },

    #[error("progress store lock poisoned")]
    Poisoned,

    #[error("progress IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("progress serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum TaskseqError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Dependency error: {0}")]
    Dependency(#[from] DependencyError),

    #[error("Progress error: {0}")]
    Progress(#[from] ProgressError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskseqError>;
