// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Test doubles shared by the unit tests of this crate.

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use webprinter_core::error::{Result, WebPrinterError};
use webprinter_core::types::{
    JobId, PrintJob, PrintOptions, PrinterState, PrinterStatusSnapshot,
};

use crate::backend::{PrinterBackend, ProgressSink};
use crate::command::{CommandOutput, CommandRunner};
use crate::store::JobStore;

/// Poll the store until the job is terminal.  Panics after five seconds.
pub async fn wait_for_terminal(store: &JobStore, id: JobId) -> PrintJob {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(job) = store.get(&id).filter(PrintJob::is_terminal) {
            return job;
        }
        assert!(tokio::time::Instant::now() < deadline, "job {id} never finished");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// What [`StubBackend::print_file`] does.
#[derive(Debug, Clone)]
pub enum StubOutcome {
    Submitted(Option<String>),
    /// Submit after sleeping, keeping the job in flight meanwhile.
    SubmittedAfter(Duration),
    Error(String),
    Panic,
}

/// A backend with fixed answers, for pipeline and service tests.
pub struct StubBackend {
    outcome: StubOutcome,
    printers: Vec<String>,
}

impl StubBackend {
    pub fn new(outcome: StubOutcome) -> Self {
        Self {
            outcome,
            printers: vec!["HPLaser".to_string()],
        }
    }
}

#[async_trait]
impl PrinterBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn list_printers(&self) -> Result<Vec<String>> {
        Ok(self.printers.clone())
    }

    async fn default_printer(&self) -> Option<String> {
        self.printers.first().cloned()
    }

    async fn print_file(
        &self,
        _path: &Path,
        _options: &PrintOptions,
        progress: &dyn ProgressSink,
    ) -> Result<Option<String>> {
        progress.report(50, "stub printing");
        match &self.outcome {
            StubOutcome::Submitted(id) => Ok(id.clone()),
            StubOutcome::SubmittedAfter(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(None)
            }
            StubOutcome::Error(detail) => Err(WebPrinterError::backend(detail.clone())),
            StubOutcome::Panic => panic!("stub backend exploded"),
        }
    }

    async fn get_status(&self, printer: &str) -> Result<PrinterStatusSnapshot> {
        Ok(PrinterStatusSnapshot {
            printer: printer.to_string(),
            state: PrinterState::Idle,
            message: "idle".into(),
            enabled: Some(true),
            accepting_jobs: Some(true),
            queue_length: 0,
            device_uri: None,
            reasons: Vec::new(),
            toner_levels: Vec::new(),
            toner_note: None,
        })
    }
}

enum Reply {
    Outputs(VecDeque<CommandOutput>),
    Error(String),
}

struct Rule {
    program: String,
    args_prefix: Vec<String>,
    reply: Reply,
}

/// One recorded `run` call.
#[derive(Debug, Clone)]
pub struct Call {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
}

/// A `CommandRunner` that replays canned output and records every call.
///
/// A rule matches when the program is equal and its arguments start with
/// the rule's prefix.  Each call pops the next output; the last one repeats.
/// Calls with no matching rule fail like a missing tool.
#[derive(Default)]
pub struct ScriptedRunner {
    available: HashSet<String>,
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark programs as installed for `is_available`.
    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        self.available.extend(tools.iter().map(|t| t.to_string()));
        self
    }

    pub fn respond(self, program: &str, args_prefix: &[&str], outputs: Vec<CommandOutput>) -> Self {
        self.push_rule(program, args_prefix, Reply::Outputs(outputs.into()))
    }

    /// Make matching calls fail the way `SystemRunner` does, e.g. on timeout.
    pub fn respond_error(self, program: &str, args_prefix: &[&str], message: &str) -> Self {
        self.push_rule(program, args_prefix, Reply::Error(message.to_string()))
    }

    fn push_rule(self, program: &str, args_prefix: &[&str], reply: Reply) -> Self {
        self.lock_rules().push(Rule {
            program: program.to_string(),
            args_prefix: args_prefix.iter().map(|a| a.to_string()).collect(),
            reply,
        });
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls made to `program`, arguments only.
    pub fn calls_to(&self, program: &str) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|call| call.program == program)
            .map(|call| call.args)
            .collect()
    }

    /// Timeouts passed with each call to `program`.
    pub fn timeouts_to(&self, program: &str) -> Vec<Option<Duration>> {
        self.calls()
            .into_iter()
            .filter(|call| call.program == program)
            .map(|call| call.timeout)
            .collect()
    }

    fn lock_rules(&self) -> std::sync::MutexGuard<'_, Vec<Rule>> {
        self.rules.lock().unwrap()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Option<Duration>,
    ) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(Call {
            program: program.to_string(),
            args: args.to_vec(),
            timeout,
        });

        let mut rules = self.lock_rules();
        let rule = rules
            .iter_mut()
            .find(|rule| rule.program == program && args.starts_with(&rule.args_prefix))
            .ok_or_else(|| WebPrinterError::backend(format!("Could not run '{program}': not scripted")))?;

        let outputs = match &mut rule.reply {
            Reply::Outputs(outputs) => outputs,
            Reply::Error(message) => return Err(WebPrinterError::backend(message.clone())),
        };
        let output = if outputs.len() > 1 {
            outputs.pop_front()
        } else {
            outputs.front().cloned()
        };
        Ok(output.unwrap_or_default())
    }

    fn is_available(&self, program: &str) -> bool {
        self.available.contains(program)
    }
}
