// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod progress;
pub mod registry;
pub mod report;
pub mod task;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::config::loader::{config_root_dir, load_and_validate};
use crate::config::model::ConfigFile;
use crate::engine::{Orchestrator, RunConfig, RunStatus};
use crate::progress::{FileProgressStore, MemoryProgressStore, ProgressStore};
use crate::report::ConsoleObserver;
use crate::types::ExecutionMode;

pub use crate::dag::DependencyValidator;
pub use crate::engine::{ExecutionContext, ExecutionResult, TaskName, TaskResult};
pub use crate::registry::TaskRegistry;
pub use crate::task::Task;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - pipeline loading and registry construction
/// - the progress store (file-backed unless `--memory`)
/// - Ctrl-C handling (cancels the run between tasks / items)
/// - the orchestrator, on a blocking thread
/// - summary output
pub async fn run(args: CliArgs) -> Result<RunStatus> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading pipeline file {config_path:?}"))?;

    let order: Vec<TaskName> = args
        .order
        .clone()
        .unwrap_or_else(|| cfg.order().to_vec());
    let mode = args.mode();

    let store = open_store(&args, &cfg, &config_path);
    let orchestrator = Orchestrator::new(exec::build_registry(&cfg)?, store.clone())
        .with_observer(Arc::new(ConsoleObserver::new()));

    // Stored progress is only discarded for an order that will actually run.
    if args.clear_progress && mode != ExecutionMode::DryRun {
        match orchestrator.validate(order.as_slice()) {
            Ok(()) => {
                for name in &order {
                    store.clear(name)?;
                }
                info!(tasks = order.len(), "cleared stored progress");
            }
            Err(err) => warn!(error = %err, "order rejected; keeping stored progress"),
        }
    }

    let mut run_config = RunConfig::new(mode);
    run_config.options.extend(args.options.iter().cloned());

    // Ctrl-C → cancel between tasks / items.
    {
        let cancel = run_config.cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            warn!("interrupt received; stopping after the current item");
            cancel.cancel();
        });
    }

    let run_order = order.clone();
    let result = tokio::task::spawn_blocking(move || orchestrator.execute_with(run_order, run_config))
        .await
        .context("engine thread terminated abnormally")?;

    if result.is_success() && mode != ExecutionMode::DryRun && cfg.config.clear_on_success {
        for name in &result.completed {
            store.clear(name)?;
        }
        info!(tasks = result.completed.len(), "cleared progress after successful run");
    }

    report::print_result(&result, args.json)?;
    Ok(result.status)
}

fn open_store(args: &CliArgs, cfg: &ConfigFile, config_path: &Path) -> Arc<dyn ProgressStore> {
    if args.memory {
        info!("keeping progress in memory only");
        return Arc::new(MemoryProgressStore::new());
    }

    let path = args
        .progress_file
        .clone()
        .unwrap_or_else(|| cfg.config.progress_file.clone());
    let path = if path.is_relative() {
        config_root_dir(config_path).join(path)
    } else {
        path
    };
    info!(path = ?path, "using progress file");
    Arc::new(FileProgressStore::new(path))
}
