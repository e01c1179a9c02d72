// src/exec/command.rs

use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

/// Run `cmd` through the platform shell and return its non-empty stdout lines.
///
/// Stderr is logged at debug level. A non-zero exit status is an error that
/// carries the last stderr line, if any.
pub fn run_shell(task: &str, cmd: &str, env: &[(String, String)]) -> Result<Vec<String>> {
    info!(task = %task, cmd = %cmd, "starting task process");

    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    command
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let output = command
        .output()
        .with_context(|| format!("spawning process for task '{task}'"))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    for line in stderr.lines() {
        debug!(task = %task, "stderr: {}", line);
    }

    let code = output.status.code().unwrap_or(-1);
    info!(
        task = %task,
        exit_code = code,
        success = output.status.success(),
        "task process exited"
    );

    if !output.status.success() {
        match stderr.lines().rev().find(|l| !l.trim().is_empty()) {
            Some(last) => bail!("command exited with status {code}: {}", last.trim()),
            None => bail!("command exited with status {code}"),
        }
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Replace every `{key}` placeholder in `template` with `value`.
pub fn substitute(template: &str, key: &str, value: &str) -> String {
    template.replace(&format!("{{{key}}}"), value)
}

/// Turn a caller option key into an environment variable name:
/// `db.host` becomes `TASKSEQ_OPT_DB_HOST`.
pub fn option_env_name(key: &str) -> String {
    let suffix: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("TASKSEQ_OPT_{suffix}")
}
