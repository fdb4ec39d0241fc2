// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print service façade.
//
// The single entry point for front ends: validates submissions, owns the
// job store and worker pool, and forwards printer queries to whichever
// backend was selected at startup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use webprinter_core::config::AppConfig;
use webprinter_core::error::{Result, WebPrinterError};
use webprinter_core::types::{
    ColorMode, JobId, JobStatus, JobUpdate, PrintJob, PrintOptions, PrinterStatusSnapshot,
};

use crate::backend::BackendHandle;
use crate::command::SystemRunner;
use crate::pipeline::{FAILED_MESSAGE, PrintPipeline};
use crate::selector::{HostPlatform, select_backend};
use crate::store::JobStore;

/// Print jobs and printer queries over one backend.
pub struct PrintService {
    config: AppConfig,
    backend: BackendHandle,
    store: Arc<JobStore>,
    pipeline: PrintPipeline,
}

impl PrintService {
    /// Start the worker pool over an already-selected backend.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(backend: BackendHandle, config: AppConfig) -> Self {
        let store = Arc::new(JobStore::new());
        let pipeline = PrintPipeline::start(config.worker_count, Arc::clone(&store), backend.clone());
        Self {
            config,
            backend,
            store,
            pipeline,
        }
    }

    /// Detect the spooler on this host and start.
    pub fn from_host(config: AppConfig) -> Self {
        let backend = select_backend(Arc::new(SystemRunner), &config, HostPlatform::current());
        Self::start(backend, config)
    }

    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }

    /// Build validated options from raw front-end input.
    ///
    /// The printer falls back to [`resolve_printer`](Self::resolve_printer).
    pub async fn build_options(
        &self,
        printer: Option<&str>,
        copies: u32,
        color: &str,
        duplex: bool,
    ) -> Result<PrintOptions> {
        let color: ColorMode = color.parse()?;
        let printer = self
            .resolve_printer(printer)
            .await?
            .ok_or_else(|| WebPrinterError::validation("No printer available."))?;
        Ok(PrintOptions::new(printer, copies, color.is_color(), duplex))
    }

    /// Accept a staged file for printing and return the queued job.
    ///
    /// Ownership of `file_path` passes to the service: it is deleted on
    /// rejection here, or by the pipeline once the job is terminal.
    pub async fn submit(&self, file_path: PathBuf, options: PrintOptions) -> Result<PrintJob> {
        let filename = file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        self.submit_named(file_path, filename, options).await
    }

    /// Like [`submit`](Self::submit) with an explicit display name.
    #[instrument(skip(self, file_path, filename, options), fields(printer = %options.printer))]
    pub async fn submit_named(
        &self,
        file_path: PathBuf,
        filename: impl Into<String>,
        options: PrintOptions,
    ) -> Result<PrintJob> {
        if let Err(e) = self.validate(&options).await {
            warn!(error = %e, "submission rejected");
            discard(&file_path).await;
            return Err(e);
        }

        let job = self
            .store
            .create(PrintJob::queued(filename, file_path, &options));
        info!(job_id = %job.id, file = %job.filename, "job queued");

        if let Err(e) = self.pipeline.dispatch(job.id) {
            // Lost a race with shutdown; leave no queued record behind.
            self.store.update(
                &job.id,
                JobUpdate::new()
                    .status(JobStatus::Failed)
                    .message(FAILED_MESSAGE)
                    .error(Some(e.to_string())),
            );
            if let Some(path) = &job.stored_path {
                discard(path).await;
            }
            return Err(e);
        }
        Ok(job)
    }

    async fn validate(&self, options: &PrintOptions) -> Result<()> {
        if self.pipeline.is_closed() {
            return Err(WebPrinterError::PipelineClosed);
        }
        let backend = self.backend.backend()?;

        if options.copies < 1 || options.copies > self.config.max_copies {
            return Err(WebPrinterError::validation(format!(
                "Invalid number of copies (1-{}).",
                self.config.max_copies
            )));
        }
        if options.printer.trim().is_empty() {
            return Err(WebPrinterError::validation("No printer selected."));
        }
        let printers = backend.list_printers().await?;
        if !printers.iter().any(|p| p == &options.printer) {
            return Err(WebPrinterError::validation(format!(
                "Printer '{}' is not available.",
                options.printer
            )));
        }
        Ok(())
    }

    /// Current copy of a job.
    pub fn snapshot(&self, id: &JobId) -> Option<PrintJob> {
        self.store.get(id)
    }

    /// All jobs, newest first.
    pub fn jobs(&self) -> Vec<PrintJob> {
        self.store.list()
    }

    pub async fn enumerate_printers(&self) -> Result<Vec<String>> {
        self.backend.backend()?.list_printers().await
    }

    pub async fn resolve_default(&self) -> Result<Option<String>> {
        Ok(self.backend.backend()?.default_printer().await)
    }

    /// `requested` if given, else the default printer, else the first one
    /// listed.
    pub async fn resolve_printer(&self, requested: Option<&str>) -> Result<Option<String>> {
        if let Some(name) = requested.map(str::trim).filter(|n| !n.is_empty()) {
            return Ok(Some(name.to_string()));
        }
        if let Some(default) = self.resolve_default().await? {
            return Ok(Some(default));
        }
        Ok(self.enumerate_printers().await?.into_iter().next())
    }

    pub async fn status(&self, printer: &str) -> Result<PrinterStatusSnapshot> {
        self.backend.backend()?.get_status(printer).await
    }

    /// Stop accepting submissions.  Running jobs finish in the background.
    pub fn shutdown(&self) {
        self.pipeline.shutdown();
    }
}

/// Best-effort removal of a staged file that will never be printed.
async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "discarded staged file"),
        Err(e) => debug!(path = %path.display(), error = %e, "staged file not removed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutput;
    use crate::cups::CupsBackend;
    use crate::testing::{ScriptedRunner, StubBackend, StubOutcome, wait_for_terminal};

    fn stage(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"%PDF-1.4\n").unwrap();
        path
    }

    fn stub_service(outcome: StubOutcome) -> PrintService {
        PrintService::start(
            BackendHandle::Ready(Arc::new(StubBackend::new(outcome))),
            AppConfig::default(),
        )
    }

    #[tokio::test]
    async fn cups_job_runs_to_completion() {
        let queued = CommandOutput::ok("123 alice 2048 Mon 01 Jan 2024 10:00:00\n");
        let runner = Arc::new(
            ScriptedRunner::new()
                .with_tools(&["lp", "lpstat"])
                .respond("lpstat", &["-a"], vec![CommandOutput::ok("HPLaser accepting requests\n")])
                .respond("lp", &[], vec![CommandOutput::ok("request id is 123 (1 file(s))\n")])
                .respond(
                    "lpstat",
                    &["-o", "HPLaser"],
                    vec![queued.clone(), queued, CommandOutput::ok("")],
                ),
        );
        let config = AppConfig {
            queue_poll_interval_ms: 1,
            ..AppConfig::default()
        };
        let backend = CupsBackend::new(runner.clone(), &config).unwrap();
        let service = PrintService::start(BackendHandle::Ready(Arc::new(backend)), config);

        let dir = tempfile::tempdir().unwrap();
        let staged = stage(dir.path(), "report.pdf");
        let options = PrintOptions::new("HPLaser", 2, false, true);
        let queued_job = service.submit(staged.clone(), options).await.unwrap();
        assert_eq!(queued_job.status, JobStatus::Queued);
        assert_eq!(queued_job.progress, PrintJob::QUEUED_PROGRESS);

        let done = wait_for_terminal(&service.store, queued_job.id).await;
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.progress, 100);
        assert_eq!(done.printer_job_id.as_deref(), Some("123"));
        assert_eq!(done.error, None);
        assert!(!staged.exists());

        let lp_calls = runner.calls_to("lp");
        assert_eq!(lp_calls.len(), 1);
        assert!(lp_calls[0].contains(&"sides=two-sided-long-edge".to_string()));
        assert!(lp_calls[0].contains(&"ColorModel=Gray".to_string()));
    }

    #[tokio::test]
    async fn backend_error_ends_in_failed() {
        let service = stub_service(StubOutcome::Error("printer offline".into()));
        let dir = tempfile::tempdir().unwrap();
        let staged = stage(dir.path(), "report.pdf");

        let job = service
            .submit(staged, PrintOptions::new("HPLaser", 2, false, true))
            .await
            .unwrap();
        let done = wait_for_terminal(&service.store, job.id).await;

        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.progress, 100);
        assert_eq!(done.message, FAILED_MESSAGE);
        assert_eq!(done.error.as_deref(), Some("printer offline"));
    }

    #[tokio::test]
    async fn boot_error_is_reported_everywhere() {
        let service = PrintService::start(
            BackendHandle::Unavailable("no backend available".into()),
            AppConfig::default(),
        );
        let dir = tempfile::tempdir().unwrap();
        let staged = stage(dir.path(), "report.pdf");

        let err = service
            .submit(staged.clone(), PrintOptions::new("HPLaser", 1, false, false))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no backend available");
        assert!(!staged.exists());
        assert!(service.jobs().is_empty());

        let err = service.enumerate_printers().await.unwrap_err();
        assert_eq!(err.to_string(), "no backend available");
        let err = service.status("HPLaser").await.unwrap_err();
        assert_eq!(err.to_string(), "no backend available");
        assert!(service.resolve_default().await.is_err());
    }

    #[tokio::test]
    async fn invalid_options_are_rejected_synchronously() {
        let service = stub_service(StubOutcome::Submitted(None));
        let dir = tempfile::tempdir().unwrap();

        for copies in [0, 100] {
            let staged = stage(dir.path(), "copies.pdf");
            let err = service
                .submit(staged.clone(), PrintOptions::new("HPLaser", copies, false, false))
                .await
                .unwrap_err();
            assert!(matches!(err, WebPrinterError::Validation(_)));
            assert!(!staged.exists());
        }

        let staged = stage(dir.path(), "ghost.pdf");
        let err = service
            .submit(staged, PrintOptions::new("Ghost", 1, false, false))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Printer 'Ghost' is not available.");

        assert!(matches!(
            service.build_options(None, 1, "sepia", false).await,
            Err(WebPrinterError::Validation(_))
        ));
        assert!(service.jobs().is_empty());
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_rejected_without_record() {
        let service = stub_service(StubOutcome::Submitted(None));
        service.shutdown();
        let dir = tempfile::tempdir().unwrap();
        let staged = stage(dir.path(), "late.pdf");

        let err = service
            .submit(staged.clone(), PrintOptions::new("HPLaser", 1, false, false))
            .await
            .unwrap_err();

        assert!(matches!(err, WebPrinterError::PipelineClosed));
        assert!(!staged.exists());
        assert!(service.jobs().is_empty());
    }

    #[tokio::test]
    async fn options_fall_back_to_default_printer() {
        let service = stub_service(StubOutcome::Submitted(None));
        let options = service.build_options(None, 3, "Color", true).await.unwrap();
        assert_eq!(options, PrintOptions::new("HPLaser", 3, true, true));

        let explicit = service.build_options(Some(" Office "), 1, "bw", false).await.unwrap();
        assert_eq!(explicit.printer, "Office");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submissions_stay_independent() {
        let service = Arc::new(stub_service(StubOutcome::Submitted(Some("9".into()))));
        let dir = tempfile::tempdir().unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let service = Arc::clone(&service);
                let staged = stage(dir.path(), &format!("doc-{i}.pdf"));
                tokio::spawn(async move {
                    service
                        .submit_named(staged, format!("doc-{i}.pdf"), PrintOptions::new("HPLaser", i + 1, false, false))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap().id);
        }

        assert_eq!(service.jobs().len(), 8);
        for id in ids {
            let done = wait_for_terminal(&service.store, id).await;
            let index: u32 = done
                .filename
                .trim_start_matches("doc-")
                .trim_end_matches(".pdf")
                .parse()
                .unwrap();
            assert_eq!(done.copies, index + 1);
            assert_eq!(done.status, JobStatus::Completed);
        }
        service.shutdown();
    }
}
