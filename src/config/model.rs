// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::engine::TaskName;
use crate::progress::file::DEFAULT_PROGRESS_FILE;
use crate::types::ErrorStrategy;

/// Top-level pipeline file exactly as deserialized from TOML.
///
/// ```toml
/// [config]
/// order = ["list", "fetch"]
///
/// [task.list]
/// cmd = "ls data"
///
/// [task.fetch]
/// cmd = "cat data/{param}"
/// params_from = "list"
/// error_strategy = "continue"
/// ```
///
/// Convert into a [`ConfigFile`] with `TryFrom` to validate it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    /// Global settings from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<TaskName, TaskConfig>,
}

/// A validated pipeline file.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub task: BTreeMap<TaskName, TaskConfig>,
}

impl ConfigFile {
    /// Wrap already validated sections.
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        task: BTreeMap<TaskName, TaskConfig>,
    ) -> Self {
        Self { config, task }
    }

    pub fn order(&self) -> &[TaskName] {
        &self.config.order
    }

    pub fn task(&self, name: &str) -> Option<&TaskConfig> {
        self.task.get(name)
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Task names in execution order.
    #[serde(default)]
    pub order: Vec<TaskName>,

    /// Where the file-backed progress store lives. Relative paths are resolved
    /// against the directory of the pipeline file.
    #[serde(default = "default_progress_file")]
    pub progress_file: PathBuf,

    /// Clear the progress of every completed task after a fully successful
    /// run.
    #[serde(default)]
    pub clear_on_success: bool,
}

fn default_progress_file() -> PathBuf {
    PathBuf::from(DEFAULT_PROGRESS_FILE)
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            progress_file: default_progress_file(),
            clear_on_success: false,
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Shell command. `{item}` / `{param}` are substituted for collection
    /// tasks.
    pub cmd: String,

    /// Tasks that must run before this one.
    #[serde(default)]
    pub after: Vec<TaskName>,

    /// Static collection: run `cmd` once per item, resumably.
    #[serde(default)]
    pub items: Option<Vec<String>>,

    /// Parameter source: run `cmd` once per stdout line of that task.
    #[serde(default)]
    pub params_from: Option<TaskName>,

    #[serde(default)]
    pub error_strategy: ErrorStrategy,

    #[serde(default)]
    pub max_retries: u32,
}

/// Which shell adapter a task maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Plain,
    Items,
    Params,
}

impl TaskConfig {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            after: Vec::new(),
            items: None,
            params_from: None,
            error_strategy: ErrorStrategy::default(),
            max_retries: 0,
        }
    }

    pub fn kind(&self) -> TaskKind {
        match (&self.items, &self.params_from) {
            (Some(_), _) => TaskKind::Items,
            (None, Some(_)) => TaskKind::Params,
            (None, None) => TaskKind::Plain,
        }
    }

    /// `after` plus the implicit dependency on `params_from`.
    pub fn dependencies(&self) -> Vec<TaskName> {
        let mut deps = self.after.clone();
        if let Some(source) = &self.params_from {
            if !deps.contains(source) {
                deps.push(source.clone());
            }
        }
        deps
    }
}
