// src/config/validate.rs

use regex::Regex;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, TaskseqError};
use crate::types::ErrorStrategy;

const TASK_NAME_PATTERN: &str = r"^[A-Za-z0-9_.-]+$";

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::TaskseqError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.task))
    }
}

/// Validate a parsed pipeline file.
///
/// Dependency ordering is not checked here; the engine validates the order
/// against the declared dependencies when the run starts.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_raw_config(cfg)
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_task_names(cfg)?;
    validate_order(cfg)?;
    validate_task_references(cfg)?;
    validate_task_sources(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> TaskseqError {
    TaskseqError::Config(msg.into())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(config_error(
            "pipeline must contain at least one [task.<name>] section",
        ));
    }
    Ok(())
}

fn validate_task_names(cfg: &RawConfigFile) -> Result<()> {
    let re = Regex::new(TASK_NAME_PATTERN)
        .map_err(|e| config_error(format!("invalid task name pattern: {e}")))?;
    for name in cfg.task.keys() {
        if !re.is_match(name) {
            return Err(config_error(format!(
                "invalid task name '{name}': only letters, digits, '_', '-' and '.' are allowed"
            )));
        }
    }
    Ok(())
}

fn validate_order(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.order.is_empty() {
        return Err(config_error("[config].order must list at least one task"));
    }
    for name in &cfg.config.order {
        if !cfg.task.contains_key(name) {
            return Err(config_error(format!(
                "[config].order references unknown task '{name}'"
            )));
        }
    }
    Ok(())
}

fn validate_task_references(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if !cfg.task.contains_key(dep) {
                return Err(config_error(format!(
                    "task '{name}' has unknown dependency '{dep}' in `after`"
                )));
            }
            if dep == name {
                return Err(config_error(format!(
                    "task '{name}' cannot depend on itself in `after`"
                )));
            }
        }
        if let Some(source) = &task.params_from {
            if !cfg.task.contains_key(source) {
                return Err(config_error(format!(
                    "task '{name}' takes parameters from unknown task '{source}'"
                )));
            }
            if source == name {
                return Err(config_error(format!(
                    "task '{name}' cannot take parameters from itself"
                )));
            }
        }
    }
    Ok(())
}

fn validate_task_sources(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        if task.items.is_some() && task.params_from.is_some() {
            return Err(config_error(format!(
                "task '{name}' cannot set both `items` and `params_from`"
            )));
        }
        if task.error_strategy == ErrorStrategy::Retry && task.max_retries == 0 {
            return Err(config_error(format!(
                "task '{name}': error_strategy \"retry\" requires max_retries > 0"
            )));
        }
        if task.cmd.trim().is_empty() {
            return Err(config_error(format!("task '{name}' has an empty `cmd`")));
        }
    }
    Ok(())
}
