use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a run treats its tasks.
///
/// - `Run`: execute every task normally, starting collection tasks fresh.
/// - `DryRun`: validate the order and report the plan; no task executes.
/// - `Resume`: like `Run`, but collection tasks consult persisted progress and
///   skip work that already completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    #[default]
    Run,
    DryRun,
    Resume,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Run => f.write_str("run"),
            ExecutionMode::DryRun => f.write_str("dry-run"),
            ExecutionMode::Resume => f.write_str("resume"),
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "run" => Ok(ExecutionMode::Run),
            "dry-run" | "dry_run" | "dryrun" => Ok(ExecutionMode::DryRun),
            "resume" => Ok(ExecutionMode::Resume),
            other => Err(format!(
                "invalid execution mode: {other} (expected \"run\", \"dry-run\" or \"resume\")"
            )),
        }
    }
}

/// How a parameter-driven task reacts to a fault for one parameter.
///
/// - `Stop` (default): the first fault aborts the remaining parameters.
/// - `Continue`: record the fault and move on to the next parameter.
/// - `Retry`: re-attempt the parameter up to `max_retries` more times, then
///   record it and move on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorStrategy {
    #[default]
    Stop,
    Continue,
    Retry,
}

impl fmt::Display for ErrorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorStrategy::Stop => f.write_str("stop"),
            ErrorStrategy::Continue => f.write_str("continue"),
            ErrorStrategy::Retry => f.write_str("retry"),
        }
    }
}

impl FromStr for ErrorStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stop" => Ok(ErrorStrategy::Stop),
            "continue" => Ok(ErrorStrategy::Continue),
            "retry" => Ok(ErrorStrategy::Retry),
            other => Err(format!(
                "invalid error_strategy: {other} (expected \"stop\", \"continue\" or \"retry\")"
            )),
        }
    }
}
