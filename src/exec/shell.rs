// src/exec/shell.rs

use anyhow::{Context, Result, anyhow};
use serde_json::Value;

use crate::config::model::TaskConfig;
use crate::engine::{ExecutionContext, TaskName, TaskResult};
use crate::exec::command::{option_env_name, run_shell, substitute};
use crate::task::{IterableTask, ParameterizedIterableTask, Task};

/// Environment shared by every command of a run.
fn base_env(task: &str, ctx: &ExecutionContext) -> Vec<(String, String)> {
    let mut env = vec![
        ("TASKSEQ_TASK".to_string(), task.to_string()),
        (
            "TASKSEQ_RESUME".to_string(),
            if ctx.is_resume() { "1" } else { "0" }.to_string(),
        ),
    ];
    env.extend(
        ctx.config()
            .options
            .iter()
            .map(|(k, v)| (option_env_name(k), v.clone())),
    );
    env
}

/// Runs its command once; stdout lines become payload `lines`.
#[derive(Debug, Clone)]
pub struct ShellTask {
    name: TaskName,
    cmd: String,
    deps: Vec<TaskName>,
}

impl ShellTask {
    pub fn new(name: impl Into<TaskName>, cfg: &TaskConfig) -> Self {
        Self {
            name: name.into(),
            cmd: cfg.cmd.clone(),
            deps: cfg.dependencies(),
        }
    }
}

impl Task for ShellTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn depends_on(&self) -> Vec<TaskName> {
        self.deps.clone()
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<TaskResult> {
        let lines = run_shell(&self.name, &self.cmd, &base_env(&self.name, ctx))?;
        Ok(TaskResult::success()
            .with_data("lines", lines)
            .with_metadata("cmd", self.cmd.clone()))
    }
}

/// Runs its command once per configured item, `{item}` substituted.
#[derive(Debug, Clone)]
pub struct ShellItemsTask {
    name: TaskName,
    cmd: String,
    deps: Vec<TaskName>,
    items: Vec<String>,
}

impl ShellItemsTask {
    pub fn new(name: impl Into<TaskName>, cfg: &TaskConfig) -> Self {
        Self {
            name: name.into(),
            cmd: cfg.cmd.clone(),
            deps: cfg.dependencies(),
            items: cfg.items.clone().unwrap_or_default(),
        }
    }
}

impl IterableTask for ShellItemsTask {
    type Item = String;

    fn name(&self) -> &str {
        &self.name
    }

    fn depends_on(&self) -> Vec<TaskName> {
        self.deps.clone()
    }

    fn get_items(&self, _ctx: &ExecutionContext) -> Result<Vec<String>> {
        Ok(self.items.clone())
    }

    fn item_id(&self, item: &String) -> String {
        item.clone()
    }

    fn execute_for_item(&self, item: &String, ctx: &ExecutionContext) -> Result<()> {
        let mut env = base_env(&self.name, ctx);
        env.push(("TASKSEQ_ITEM".to_string(), item.clone()));
        run_shell(&self.name, &substitute(&self.cmd, "item", item), &env)?;
        Ok(())
    }
}

/// Runs its command once per stdout line of the `params_from` task,
/// `{param}` substituted.
#[derive(Debug, Clone)]
pub struct ShellParamsTask {
    name: TaskName,
    cmd: String,
    deps: Vec<TaskName>,
    source: TaskName,
}

impl ShellParamsTask {
    pub fn new(name: impl Into<TaskName>, cfg: &TaskConfig, source: impl Into<TaskName>) -> Self {
        Self {
            name: name.into(),
            cmd: cfg.cmd.clone(),
            deps: cfg.dependencies(),
            source: source.into(),
        }
    }
}

impl ParameterizedIterableTask for ShellParamsTask {
    type Param = String;

    fn name(&self) -> &str {
        &self.name
    }

    fn depends_on(&self) -> Vec<TaskName> {
        self.deps.clone()
    }

    fn get_parameters(&self, ctx: &ExecutionContext) -> Result<Vec<String>> {
        let result = ctx
            .result(&self.source)
            .ok_or_else(|| anyhow!("no result recorded for parameter source '{}'", self.source))?;
        let lines = result
            .get("lines")
            .and_then(Value::as_array)
            .with_context(|| format!("task '{}' produced no `lines` payload", self.source))?;
        Ok(lines
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect())
    }

    fn execute_for_parameter(&self, param: &String, ctx: &ExecutionContext) -> Result<()> {
        let mut env = base_env(&self.name, ctx);
        env.push(("TASKSEQ_PARAM".to_string(), param.clone()));
        run_shell(&self.name, &substitute(&self.cmd, "param", param), &env)?;
        Ok(())
    }
}
