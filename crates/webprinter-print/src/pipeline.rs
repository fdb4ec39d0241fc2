// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Background print pipeline.
//
// A fixed pool of workers pulls job ids from an unbounded channel and runs
// each job to a terminal state:
//
//   queued → preparing → printing* → completed | failed
//
// Every backend failure (error, or a panic inside the backend) lands in
// `failed` with the detail in the job's error field.  The staged file is
// removed afterwards whatever the outcome.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use webprinter_core::error::{Result, WebPrinterError};
use webprinter_core::types::{JobId, JobStatus, JobUpdate, PrintJob};

use crate::backend::{BackendHandle, ProgressSink};
use crate::store::JobStore;

/// Progress recorded when a worker picks a job up.
pub const PREPARING_PROGRESS: u8 = 20;

pub const PREPARING_MESSAGE: &str = "Preparing the file.";
pub const COMPLETED_MESSAGE: &str = "Print job sent successfully.";
pub const FAILED_MESSAGE: &str = "An error occurred while printing.";
pub const CLEANUP_FAILED_MESSAGE: &str =
    "Printing finished, but the temporary file could not be deleted.";

/// Progress sink bound to one job in the store.
///
/// Every report moves the job to `printing`; percentages are clamped to 99.
#[derive(Debug, Clone)]
pub struct JobProgress {
    store: Arc<JobStore>,
    id: JobId,
}

impl JobProgress {
    pub fn new(store: Arc<JobStore>, id: JobId) -> Self {
        Self { store, id }
    }
}

impl ProgressSink for JobProgress {
    fn report(&self, percent: u8, message: &str) {
        debug!(job_id = %self.id, percent, message, "progress");
        self.store.update(
            &self.id,
            JobUpdate::new()
                .status(JobStatus::Printing)
                .progress(percent.min(99))
                .message(message),
        );
    }
}

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<JobId>>>;

/// Worker pool executing print jobs.
pub struct PrintPipeline {
    sender: Mutex<Option<mpsc::UnboundedSender<JobId>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl PrintPipeline {
    /// Spawn `worker_count` workers (at least one) on the current runtime.
    pub fn start(worker_count: usize, store: Arc<JobStore>, backend: BackendHandle) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver: SharedReceiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let workers = (0..worker_count.max(1))
            .map(|index| {
                tokio::spawn(worker_loop(
                    index,
                    Arc::clone(&receiver),
                    Arc::clone(&store),
                    backend.clone(),
                ))
            })
            .collect();

        info!(workers = worker_count.max(1), "print pipeline started");
        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        }
    }

    /// Queue a job for execution.  Returns immediately.
    pub fn dispatch(&self, id: JobId) -> Result<()> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            Some(sender) => sender.send(id).map_err(|_| WebPrinterError::PipelineClosed),
            None => Err(WebPrinterError::PipelineClosed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Stop accepting jobs and abort the workers.
    ///
    /// Not waited for: a job already running finishes in the background,
    /// including its terminal update and file cleanup.  Jobs still in the
    /// channel are dropped.
    pub fn shutdown(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let workers = std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        for worker in &workers {
            worker.abort();
        }
        info!(workers = workers.len(), "print pipeline stopped");
    }
}

impl Drop for PrintPipeline {
    fn drop(&mut self) {
        let workers = self.workers.get_mut().unwrap_or_else(PoisonError::into_inner);
        for worker in workers.iter() {
            worker.abort();
        }
    }
}

async fn worker_loop(
    index: usize,
    receiver: SharedReceiver,
    store: Arc<JobStore>,
    backend: BackendHandle,
) {
    debug!(worker = index, "worker started");
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(id) = next else {
            break;
        };
        // Detached from the worker: aborting the worker leaves it running.
        let job = tokio::spawn(run_job(Arc::clone(&store), backend.clone(), id));
        if let Err(e) = job.await {
            error!(worker = index, job_id = %id, error = %e, "job task ended abnormally");
        }
    }
    debug!(worker = index, "worker finished");
}

/// Drive one job from `queued` to a terminal state, then clean up.
#[instrument(skip(store, backend, id), fields(job_id = %id))]
pub async fn run_job(store: Arc<JobStore>, backend: BackendHandle, id: JobId) {
    let Some(job) = store.update(
        &id,
        JobUpdate::new()
            .status(JobStatus::Preparing)
            .progress(PREPARING_PROGRESS)
            .message(PREPARING_MESSAGE),
    ) else {
        warn!("dispatched job is not in the store");
        return;
    };
    info!(printer = %job.printer, file = %job.filename, "job preparing");

    let update = match execute(&store, &backend, &job).await {
        Ok(printer_job_id) => {
            info!(printer_job_id = ?printer_job_id, "job completed");
            JobUpdate::new()
                .status(JobStatus::Completed)
                .message(COMPLETED_MESSAGE)
                .printer_job_id(printer_job_id)
                .error(None)
        }
        Err(e) => {
            error!(error = %e, "job failed");
            JobUpdate::new()
                .status(JobStatus::Failed)
                .message(FAILED_MESSAGE)
                .error(Some(e.to_string()))
        }
    };
    store.update(&id, update);

    cleanup(&store, &job).await;
}

/// The print call, isolated in its own task so a backend panic becomes an
/// ordinary failure.
async fn execute(
    store: &Arc<JobStore>,
    backend: &BackendHandle,
    job: &PrintJob,
) -> Result<Option<String>> {
    let backend = Arc::clone(backend.backend()?);
    let path = job
        .stored_path
        .clone()
        .ok_or_else(|| WebPrinterError::backend("The file to print does not exist."))?;
    let options = job.options();
    let sink = JobProgress::new(Arc::clone(store), job.id);

    let task = tokio::spawn(async move { backend.print_file(&path, &options, &sink).await });
    match task.await {
        Ok(result) => result,
        Err(join_error) => Err(WebPrinterError::backend(format!(
            "The print task stopped unexpectedly: {join_error}"
        ))),
    }
}

async fn cleanup(store: &JobStore, job: &PrintJob) {
    let Some(path) = job.stored_path.as_deref() else {
        return;
    };
    if !path_exists(path).await {
        return;
    }
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "staged file removed"),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not remove staged file");
            store.update(&job.id, JobUpdate::new().message(CLEANUP_FAILED_MESSAGE));
        }
    }
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
