// src/report.rs

//! Human-facing output of the `taskseq` binary.

use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::engine::{ExecutionMode, ExecutionObserver, ExecutionResult, TaskResult};

/// Prints one line per task to stderr as the run progresses.
#[derive(Debug, Default)]
pub struct ConsoleObserver {
    items: AtomicUsize,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExecutionObserver for ConsoleObserver {
    fn on_task_start(&self, task: &str) {
        self.items.store(0, Ordering::Relaxed);
        eprintln!("==> {task}");
    }

    fn on_task_end(&self, task: &str, result: &TaskResult) {
        let items = self.items.load(Ordering::Relaxed);
        let suffix = if items > 0 {
            format!(" ({items} items)")
        } else {
            String::new()
        };
        match result.error_message() {
            Some(err) if !result.is_success() => eprintln!("<== {task}: FAILED{suffix}: {err}"),
            _ => eprintln!("<== {task}: ok{suffix}"),
        }
    }

    fn on_item_processed(&self, _task: &str, _item_id: &str) {
        self.items.fetch_add(1, Ordering::Relaxed);
    }
}

/// Write the final result to `out`, as JSON or as a text summary.
pub fn write_result<W: Write>(out: &mut W, result: &ExecutionResult, json: bool) -> io::Result<()> {
    if json {
        let text = result
            .to_json_pretty()
            .map_err(io::Error::other)?;
        return writeln!(out, "{text}");
    }

    writeln!(out, "taskseq {} ({})", result.status, result.mode)?;
    writeln!(out, "  plan: {}", result.plan.join(" -> "))?;

    if let Some(err) = &result.validation_error {
        writeln!(out, "  invalid order: {err}")?;
        return Ok(());
    }

    if result.mode == ExecutionMode::DryRun {
        writeln!(out, "  order is valid; nothing executed")?;
        return Ok(());
    }

    for name in &result.completed {
        writeln!(out, "  [ok]     {name}")?;
    }
    for name in &result.failed {
        let err = result.errors.get(name).map(String::as_str).unwrap_or("");
        writeln!(out, "  [failed] {name}: {err}")?;
    }
    for name in result.not_run() {
        writeln!(out, "  [skip]   {name}")?;
    }
    Ok(())
}

/// Print the final result to stdout.
pub fn print_result(result: &ExecutionResult, json: bool) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_result(&mut out, result, json)
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;
    use crate::engine::RunStatus;

    fn partial() -> ExecutionResult {
        let mut errors = IndexMap::new();
        errors.insert("b".to_string(), "boom".to_string());
        ExecutionResult {
            status: RunStatus::Partial,
            mode: ExecutionMode::Run,
            plan: vec!["a".into(), "b".into(), "c".into()],
            completed: vec!["a".into()],
            failed: vec!["b".into()],
            errors,
            results: IndexMap::new(),
            validation_error: None,
        }
    }

    #[test]
    fn text_summary_lists_every_task() {
        let mut out = Vec::new();
        write_result(&mut out, &partial(), false).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("taskseq partial (run)"));
        assert!(text.contains("[ok]     a"));
        assert!(text.contains("[failed] b: boom"));
        assert!(text.contains("[skip]   c"));
    }

    #[test]
    fn json_output_is_parseable() {
        let mut out = Vec::new();
        write_result(&mut out, &partial(), true).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["status"], "partial");
        assert_eq!(value["failed"][0], "b");
    }
}
