// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CUPS backend driven through the `lp`, `lpstat` and `ipptool` tools.
//
// After `lp` accepts a file the local queue is polled until the request id
// disappears.  Leaving the queue only means the local spooler released the
// job (printed, forwarded, or purged); it is not a confirmation from the
// device.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use webprinter_core::config::AppConfig;
use webprinter_core::error::{Result, WebPrinterError};
use webprinter_core::types::{PrintOptions, PrinterStatusSnapshot, TonerLevel};

use crate::backend::{PrinterBackend, ProgressSink, check_printer_name, check_submission};
use crate::command::{CommandRunner, to_args};
use crate::status;

const LP: &str = "lp";
const LPSTAT: &str = "lpstat";
const IPPTOOL: &str = "ipptool";

/// Tools that must be installed for this backend to work at all.
pub const REQUIRED_TOOLS: [&str; 2] = [LP, LPSTAT];

/// Progress reported before `lp` runs.
const SUBMIT_PROGRESS: u8 = 40;
/// Progress once `lp` returned a request id.
const QUEUED_PROGRESS: u8 = 65;
/// Progress when `lp` succeeded without a recognisable id.
const UNTRACKED_PROGRESS: u8 = 85;
/// Progress when the request left the local queue.
const RELEASED_PROGRESS: u8 = 92;

/// Printer backend for hosts running CUPS.
pub struct CupsBackend {
    runner: Arc<dyn CommandRunner>,
    poll_attempts: u32,
    poll_interval: Duration,
    ipptool_tests: Vec<PathBuf>,
}

impl CupsBackend {
    /// Build the backend, failing if `lp` or `lpstat` is missing.
    pub fn new(runner: Arc<dyn CommandRunner>, config: &AppConfig) -> Result<Self> {
        if REQUIRED_TOOLS.iter().any(|tool| !runner.is_available(tool)) {
            return Err(WebPrinterError::backend(
                "CUPS commands not found: 'lp' and 'lpstat' are required.",
            ));
        }
        Ok(Self {
            runner,
            poll_attempts: config.queue_poll_attempts,
            poll_interval: config.queue_poll_interval(),
            ipptool_tests: config.ipptool_test_paths.clone(),
        })
    }

    /// Arguments for `lp` submitting `path` with `options`.
    fn submit_args(path: &Path, options: &PrintOptions) -> Vec<String> {
        let sides = if options.duplex {
            "sides=two-sided-long-edge"
        } else {
            "sides=one-sided"
        };
        let (color_mode, color_model) = if options.color {
            ("print-color-mode=color", "ColorModel=RGB")
        } else {
            ("print-color-mode=monochrome", "ColorModel=Gray")
        };

        let mut args = vec![
            "-d".to_string(),
            options.printer.clone(),
            "-n".to_string(),
            options.copies.to_string(),
        ];
        args.extend(to_args(&["-o", sides, "-o", color_mode, "-o", color_model]));
        args.push(path.to_string_lossy().into_owned());
        args
    }

    /// Poll `lpstat -o` until `job_id` leaves the queue or attempts run out.
    async fn wait_for_release(&self, printer: &str, job_id: &str, progress: &dyn ProgressSink) {
        let args = to_args(&["-o", printer]);
        for attempt in 1..=self.poll_attempts {
            tokio::time::sleep(self.poll_interval).await;

            let listing = match self.runner.run(LPSTAT, &args, None).await {
                Ok(output) if output.success() => output.stdout,
                Ok(output) => {
                    debug!(printer, code = ?output.code, "queue listing failed, stop polling");
                    return;
                }
                Err(e) => {
                    debug!(printer, error = %e, "queue listing failed, stop polling");
                    return;
                }
            };

            if !status::queue_contains(&listing, job_id) {
                debug!(printer, job_id, attempt, "request left the local queue");
                progress.report(RELEASED_PROGRESS, "The queue accepted the job.");
                return;
            }
            progress.report(queued_progress(attempt), "Job still in the local queue.");
        }
        warn!(printer, job_id, "request still queued after polling, assuming accepted");
    }

    /// Run one `lpstat` query for status, `None` if it failed.
    async fn optional_query(&self, args: &[&str]) -> Option<String> {
        match self.runner.run(LPSTAT, &to_args(args), None).await {
            Ok(output) if output.success() => Some(output.stdout),
            Ok(output) => {
                debug!(?args, code = ?output.code, "secondary status query failed");
                None
            }
            Err(e) => {
                debug!(?args, error = %e, "secondary status query failed");
                None
            }
        }
    }

    fn find_ipptool_test(&self) -> Option<&Path> {
        self.ipptool_tests
            .iter()
            .map(PathBuf::as_path)
            .find(|path| path.exists())
    }

    /// Consumable levels via IPP, or an explanatory note.
    async fn load_toner_levels(
        &self,
        printer: &str,
        device_uri: Option<&str>,
    ) -> (Vec<TonerLevel>, Option<String>) {
        if !self.runner.is_available(IPPTOOL) {
            return (Vec::new(), Some("Toner levels unavailable (ipptool is not installed).".into()));
        }
        let Some(test_path) = self.find_ipptool_test() else {
            return (Vec::new(), Some("Toner levels unavailable (ipptool test file not found).".into()));
        };

        let mut uris = vec![format!("ipp://localhost/printers/{printer}")];
        if let Some(uri) = device_uri {
            let lower = uri.to_ascii_lowercase();
            if (lower.starts_with("ipp://") || lower.starts_with("ipps://")) && !uris.iter().any(|u| u == uri) {
                uris.push(uri.to_string());
            }
        }

        let mut last_error = None;
        for uri in &uris {
            let args = vec![
                "-c".to_string(),
                "-t".to_string(),
                uri.clone(),
                test_path.to_string_lossy().into_owned(),
            ];
            let output = match self.runner.run(IPPTOOL, &args, None).await {
                Ok(output) => output,
                Err(e) => {
                    last_error = Some(e.to_string());
                    continue;
                }
            };
            if !output.success() {
                last_error = Some(output.diagnostic("error"));
                continue;
            }

            let attributes = status::parse_ipp_attributes(&output.stdout);
            let levels = status::extract_toner_levels(&attributes);
            if levels.is_empty() {
                return (Vec::new(), Some("The printer does not expose toner levels over IPP.".into()));
            }
            return (levels, None);
        }

        let note = match last_error {
            Some(detail) => {
                warn!(printer, %detail, "toner query failed");
                format!("Could not read toner levels: {detail}")
            }
            None => "Toner levels unavailable.".to_string(),
        };
        (Vec::new(), Some(note))
    }
}

#[async_trait]
impl PrinterBackend for CupsBackend {
    fn name(&self) -> &'static str {
        "cups"
    }

    #[instrument(skip(self))]
    async fn list_printers(&self) -> Result<Vec<String>> {
        let output = self.runner.run(LPSTAT, &to_args(&["-a"]), None).await?;
        if !output.success() {
            let detail = output.stderr.trim();
            let detail = if detail.is_empty() { "unable to read printers." } else { detail };
            return Err(WebPrinterError::backend(format!("Error loading printers: {detail}")));
        }
        Ok(status::parse_printer_names(&output.stdout))
    }

    async fn default_printer(&self) -> Option<String> {
        match self.runner.run(LPSTAT, &to_args(&["-d"]), None).await {
            Ok(output) if output.success() => status::parse_default_printer(&output.stdout),
            _ => None,
        }
    }

    #[instrument(skip(self, options, progress), fields(printer = %options.printer))]
    async fn print_file(
        &self,
        path: &Path,
        options: &PrintOptions,
        progress: &dyn ProgressSink,
    ) -> Result<Option<String>> {
        check_submission(path, options)?;

        progress.report(SUBMIT_PROGRESS, "Sending the document to the local queue.");
        let output = self.runner.run(LP, &Self::submit_args(path, options), None).await?;
        if !output.success() {
            let detail = output.diagnostic("unknown error");
            return Err(WebPrinterError::backend(format!("lp command failed: {detail}")));
        }

        let job_id = status::extract_request_id(&output.stdout);
        match &job_id {
            Some(id) => {
                info!(job_id = %id, "lp accepted the document");
                progress.report(
                    QUEUED_PROGRESS,
                    &format!("Job {id} queued, checking progress."),
                );
                self.wait_for_release(&options.printer, id, progress).await;
            }
            None => {
                info!("lp accepted the document without a request id");
                progress.report(UNTRACKED_PROGRESS, "Document queued.");
            }
        }
        Ok(job_id)
    }

    #[instrument(skip(self))]
    async fn get_status(&self, printer: &str) -> Result<PrinterStatusSnapshot> {
        check_printer_name(printer)?;

        let output = self
            .runner
            .run(LPSTAT, &to_args(&["-p", printer, "-l"]), None)
            .await?;
        if !output.success() {
            let detail = output.diagnostic("unknown error");
            return Err(WebPrinterError::backend(format!(
                "Could not read the status of printer '{printer}': {detail}"
            )));
        }

        let lines: Vec<&str> = output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        let summary = lines
            .first()
            .map(|line| line.to_string())
            .unwrap_or_else(|| format!("Status not available for {printer}."));
        let (state, enabled) = status::map_cups_state(&summary);

        let accepting_jobs = self
            .optional_query(&["-a", printer])
            .await
            .map(|out| status::parse_accepting(&out));
        let queue_length = self
            .optional_query(&["-o", printer])
            .await
            .map(|out| status::count_queue_entries(&out))
            .unwrap_or(0);
        let device_uri = self
            .optional_query(&["-v", printer])
            .await
            .and_then(|out| status::parse_device_uri(&out, printer));

        let reasons = status::extract_reasons(lines.iter().skip(1).copied());
        let (toner_levels, toner_note) = self.load_toner_levels(printer, device_uri.as_deref()).await;

        Ok(PrinterStatusSnapshot {
            printer: printer.to_string(),
            state,
            message: summary,
            enabled: Some(enabled),
            accepting_jobs,
            queue_length,
            device_uri,
            reasons,
            toner_levels,
            toner_note,
        })
    }
}

/// Progress shown while a request is still queued: 70, 72, ... capped at 90.
fn queued_progress(attempt: u32) -> u8 {
    let percent = 68u32.saturating_add(attempt.saturating_mul(2)).min(90);
    u8::try_from(percent).unwrap_or(90)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use webprinter_core::types::PrinterState;

    use super::*;
    use crate::command::CommandOutput;
    use crate::testing::ScriptedRunner;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<(u8, String)>>);

    impl ProgressSink for RecordingSink {
        fn report(&self, percent: u8, message: &str) {
            self.0.lock().unwrap().push((percent, message.to_string()));
        }
    }

    impl RecordingSink {
        fn percents(&self) -> Vec<u8> {
            self.0.lock().unwrap().iter().map(|(p, _)| *p).collect()
        }
    }

    fn config() -> AppConfig {
        AppConfig {
            queue_poll_interval_ms: 1,
            ipptool_test_paths: Vec::new(),
            ..AppConfig::default()
        }
    }

    fn backend(runner: ScriptedRunner) -> (CupsBackend, Arc<ScriptedRunner>) {
        let runner = Arc::new(runner.with_tools(&["lp", "lpstat"]));
        let backend = CupsBackend::new(runner.clone(), &config()).unwrap();
        (backend, runner)
    }

    #[test]
    fn missing_tools_fail_construction() {
        let runner = Arc::new(ScriptedRunner::new().with_tools(&["lp"]));
        let err = CupsBackend::new(runner, &config()).err().unwrap();
        assert!(err.to_string().contains("lpstat"));
    }

    #[test]
    fn lp_arguments_carry_every_option() {
        let options = PrintOptions::new("HPLaser", 2, false, true);
        let args = CupsBackend::submit_args(Path::new("/tmp/a.pdf"), &options);
        assert_eq!(
            args,
            to_args(&[
                "-d",
                "HPLaser",
                "-n",
                "2",
                "-o",
                "sides=two-sided-long-edge",
                "-o",
                "print-color-mode=monochrome",
                "-o",
                "ColorModel=Gray",
                "/tmp/a.pdf",
            ])
        );

        let color = PrintOptions::new("HPLaser", 1, true, false);
        let args = CupsBackend::submit_args(Path::new("/tmp/a.pdf"), &color);
        assert!(args.contains(&"sides=one-sided".to_string()));
        assert!(args.contains(&"ColorModel=RGB".to_string()));
    }

    #[tokio::test]
    async fn print_polls_until_job_leaves_queue() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let queued = CommandOutput::ok("HPLaser-123 alice 1024 Mon 01 Jan 2024\n");
        let (backend, runner) = backend(
            ScriptedRunner::new()
                .respond("lp", &[], vec![CommandOutput::ok("request id is HPLaser-123 (1 file(s))\n")])
                .respond(
                    "lpstat",
                    &["-o", "HPLaser"],
                    vec![queued.clone(), queued, CommandOutput::ok("")],
                ),
        );

        let sink = RecordingSink::default();
        let options = PrintOptions::new("HPLaser", 2, false, true);
        let id = backend.print_file(file.path(), &options, &sink).await.unwrap();

        assert_eq!(id.as_deref(), Some("HPLaser-123"));
        assert_eq!(sink.percents(), vec![40, 65, 70, 72, 92]);
        assert_eq!(runner.calls_to("lpstat").len(), 3);
    }

    #[tokio::test]
    async fn polling_stops_at_ninety() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let (backend, _runner) = backend(
            ScriptedRunner::new()
                .respond("lp", &[], vec![CommandOutput::ok("request id is HPLaser-7 (1 file(s))\n")])
                .respond("lpstat", &["-o"], vec![CommandOutput::ok("HPLaser-7 bob 10\n")]),
        );

        let sink = RecordingSink::default();
        let options = PrintOptions::new("HPLaser", 1, false, false);
        backend.print_file(file.path(), &options, &sink).await.unwrap();

        let percents = sink.percents();
        assert_eq!(percents.len(), 2 + 12);
        assert_eq!(percents.last(), Some(&90));
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn queued_progress_saturates_for_huge_attempt_counts() {
        assert_eq!(queued_progress(1), 70);
        assert_eq!(queued_progress(11), 90);
        assert_eq!(queued_progress(u32::MAX / 2), 90);
        assert_eq!(queued_progress(u32::MAX), 90);
    }

    #[tokio::test]
    async fn lp_failure_carries_diagnostic() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let (backend, _runner) = backend(ScriptedRunner::new().respond(
            "lp",
            &[],
            vec![CommandOutput::failed(1, "lp: The printer or class does not exist.\n")],
        ));

        let options = PrintOptions::new("Ghost", 1, false, false);
        let err = backend
            .print_file(file.path(), &options, &RecordingSink::default())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "lp command failed: lp: The printer or class does not exist."
        );
    }

    #[tokio::test]
    async fn missing_file_never_spawns() {
        let (backend, runner) = backend(ScriptedRunner::new());
        let options = PrintOptions::new("HPLaser", 1, false, false);
        let result = backend
            .print_file(Path::new("/nonexistent/file.pdf"), &options, &RecordingSink::default())
            .await;
        assert!(matches!(result, Err(WebPrinterError::Backend(_))));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn status_tolerates_secondary_failures() {
        let (backend, _runner) = backend(
            ScriptedRunner::new()
                .respond(
                    "lpstat",
                    &["-p"],
                    vec![CommandOutput::ok(
                        "printer HPLaser is idle.  enabled since Mon 01 Jan 2024\n\
                         \tAlerts: toner-low, none\n",
                    )],
                )
                .respond("lpstat", &["-a"], vec![CommandOutput::failed(1, "boom")])
                .respond("lpstat", &["-o"], vec![CommandOutput::ok("HPLaser-1 a 1\nHPLaser-2 b 2\n")])
                .respond(
                    "lpstat",
                    &["-v"],
                    vec![CommandOutput::ok("device for HPLaser: socket://10.0.0.5\n")],
                ),
        );

        let snapshot = backend.get_status("HPLaser").await.unwrap();
        assert_eq!(snapshot.state, PrinterState::Idle);
        assert_eq!(snapshot.enabled, Some(true));
        assert_eq!(snapshot.accepting_jobs, None);
        assert_eq!(snapshot.queue_length, 2);
        assert_eq!(snapshot.device_uri.as_deref(), Some("socket://10.0.0.5"));
        assert_eq!(snapshot.reasons, vec!["toner-low"]);
        assert!(snapshot.toner_levels.is_empty());
        assert!(snapshot.toner_note.unwrap().contains("ipptool"));
    }

    #[tokio::test]
    async fn status_fails_when_printer_query_fails() {
        let (backend, _runner) = backend(ScriptedRunner::new().respond(
            "lpstat",
            &["-p"],
            vec![CommandOutput::failed(1, "lpstat: Invalid destination name")],
        ));
        let err = backend.get_status("Ghost").await.unwrap_err();
        assert!(err.to_string().contains("Invalid destination name"));
        assert!(backend.get_status("").await.is_err());
    }

    #[tokio::test]
    async fn toner_levels_come_from_ipptool() {
        let test_file = tempfile::NamedTempFile::new().unwrap();
        let runner = Arc::new(
            ScriptedRunner::new()
                .with_tools(&["lp", "lpstat", "ipptool"])
                .respond("lpstat", &["-p"], vec![CommandOutput::ok("printer HPLaser is idle.\n")])
                .respond("lpstat", &["-a"], vec![CommandOutput::ok("HPLaser accepting requests\n")])
                .respond("lpstat", &["-o"], vec![CommandOutput::ok("")])
                .respond(
                    "lpstat",
                    &["-v"],
                    vec![CommandOutput::ok("device for HPLaser: ipp://10.0.0.5/ipp/print\n")],
                )
                .respond(
                    "ipptool",
                    &["-c", "-t", "ipp://localhost/printers/HPLaser"],
                    vec![CommandOutput::failed(1, "connection refused")],
                )
                .respond(
                    "ipptool",
                    &["-c", "-t", "ipp://10.0.0.5/ipp/print"],
                    vec![CommandOutput::ok(
                        "marker-names (1setOf name) = Black\nmarker-levels (1setOf integer) = 4200\n",
                    )],
                ),
        );
        let config = AppConfig {
            ipptool_test_paths: vec![test_file.path().to_path_buf()],
            ..config()
        };
        let backend = CupsBackend::new(runner.clone(), &config).unwrap();

        let snapshot = backend.get_status("HPLaser").await.unwrap();
        assert_eq!(snapshot.accepting_jobs, Some(true));
        assert_eq!(snapshot.toner_levels.len(), 1);
        assert_eq!(snapshot.toner_levels[0].percent, Some(42));
        assert_eq!(snapshot.toner_note, None);
        assert_eq!(runner.calls_to("ipptool").len(), 2);
    }

    #[tokio::test]
    async fn printer_list_and_default() {
        let (backend, _runner) = backend(
            ScriptedRunner::new()
                .respond("lpstat", &["-a"], vec![CommandOutput::ok("Zeta accepting\nAlpha accepting\n")])
                .respond("lpstat", &["-d"], vec![CommandOutput::ok("system default destination: Zeta\n")]),
        );
        assert_eq!(backend.list_printers().await.unwrap(), vec!["Alpha", "Zeta"]);
        assert_eq!(backend.default_printer().await.as_deref(), Some("Zeta"));
    }
}
