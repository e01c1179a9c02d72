// src/exec/mod.rs

//! Shell-command tasks used by the `taskseq` binary.
//!
//! - [`command`] runs a single command through the platform shell.
//! - [`shell`] adapts pipeline-file tasks onto the engine's task traits.

use tracing::debug;

use crate::config::model::{ConfigFile, TaskKind};
use crate::errors::Result;
use crate::registry::TaskRegistry;
use crate::task::{Iterating, Parameterized};

pub mod command;
pub mod shell;

pub use shell::{ShellItemsTask, ShellParamsTask, ShellTask};

/// Build a registry holding one shell task per `[task.<name>]` section.
pub fn build_registry(cfg: &ConfigFile) -> Result<TaskRegistry> {
    let mut registry = TaskRegistry::new();

    for (name, task) in cfg.task.iter() {
        match (task.kind(), &task.params_from) {
            (TaskKind::Params, Some(source)) => {
                let inner = ShellParamsTask::new(name, task, source);
                registry.register(Parameterized::new(
                    inner,
                    task.error_strategy,
                    task.max_retries,
                )?)?;
            }
            (TaskKind::Items, _) => {
                registry.register(Iterating::new(ShellItemsTask::new(name, task)))?;
            }
            _ => {
                registry.register(ShellTask::new(name, task))?;
            }
        }
        debug!(task = %name, kind = ?task.kind(), "built shell task");
    }

    Ok(registry)
}
