// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// External command execution.
//
// Every spooler interaction goes through `CommandRunner` so that backends
// only see captured stdout/stderr and an exit code, and so that tests can
// replay canned tool output without spawning anything.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use webprinter_core::error::{Result, WebPrinterError};

/// Captured result of one finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// A successful run with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed run with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// The tool's own explanation: trimmed stderr, else stdout, else `fallback`.
    pub fn diagnostic(&self, fallback: &str) -> String {
        [self.stderr.trim(), self.stdout.trim()]
            .into_iter()
            .find(|text| !text.is_empty())
            .unwrap_or(fallback)
            .to_string()
    }
}

/// Runs external programs on behalf of a backend.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` to completion and capture its output.
    ///
    /// Fails only when the program cannot be started or exceeds `timeout`;
    /// a non-zero exit is reported through [`CommandOutput::code`].
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Option<Duration>,
    ) -> Result<CommandOutput>;

    /// Whether `program` can be found on this host.
    fn is_available(&self, program: &str) -> bool;
}

/// Build an owned argument vector from string slices.
pub fn to_args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Runs commands on the real host with `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Option<Duration>,
    ) -> Result<CommandOutput> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, command.output()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(program, timeout_secs = limit.as_secs(), "command timed out");
                    return Err(WebPrinterError::backend(format!(
                        "'{program}' did not finish within {} seconds.",
                        limit.as_secs()
                    )));
                }
            },
            None => command.output().await,
        };

        let output = result
            .map_err(|e| WebPrinterError::backend(format!("Could not run '{program}': {e}")))?;

        let captured = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(program, code = ?captured.code, "command finished");
        Ok(captured)
    }

    fn is_available(&self, program: &str) -> bool {
        find_in_path(program).is_some()
    }
}

/// Locate an executable the way a shell would: paths containing a separator
/// are checked directly, bare names are searched in `PATH` (with `PATHEXT`
/// suffixes on Windows).
pub fn find_in_path(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let suffixes: Vec<String> = if cfg!(windows) {
        std::env::var("PATHEXT")
            .unwrap_or_else(|_| ".EXE;.CMD;.BAT;.COM".into())
            .split(';')
            .map(str::to_string)
            .chain(std::iter::once(String::new()))
            .collect()
    } else {
        vec![String::new()]
    };

    let search_path = std::env::var_os("PATH")?;
    std::env::split_paths(&search_path).find_map(|dir| {
        suffixes
            .iter()
            .map(|suffix| dir.join(format!("{program}{suffix}")))
            .find(|full| full.is_file())
    })
}
