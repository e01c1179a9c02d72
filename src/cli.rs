// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::DEFAULT_CONFIG_FILE;
use crate::types::ExecutionMode;

/// Command-line arguments for `taskseq`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskseq",
    version,
    about = "Run an ordered, dependency-checked task pipeline with resumable progress.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the pipeline file (TOML).
    ///
    /// Default: `Taskseq.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,

    /// Comma-separated task order, overriding `[config].order`.
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub order: Option<Vec<String>>,

    /// Validate the order and print the plan, but don't execute any commands.
    #[arg(long)]
    pub dry_run: bool,

    /// Skip work recorded as done by a previous run.
    #[arg(long, conflicts_with = "dry_run")]
    pub resume: bool,

    /// Discard stored progress for every task in the order before running.
    ///
    /// Nothing is discarded when the order is rejected.
    #[arg(long, conflicts_with = "dry_run")]
    pub clear_progress: bool,

    /// Progress file, overriding `[config].progress_file`.
    #[arg(long, value_name = "PATH", conflicts_with = "memory")]
    pub progress_file: Option<PathBuf>,

    /// Keep progress in memory only (nothing survives the process).
    #[arg(long)]
    pub memory: bool,

    /// Caller option passed to tasks (repeatable).
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub options: Vec<(String, String)>,

    /// Print the run result as JSON instead of a text summary.
    #[arg(long)]
    pub json: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKSEQ_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

impl CliArgs {
    pub fn mode(&self) -> ExecutionMode {
        if self.dry_run {
            ExecutionMode::DryRun
        } else if self.resume {
            ExecutionMode::Resume
        } else {
            ExecutionMode::Run
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` found in `{s}`"))?;
    if key.trim().is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in `{s}`"));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
