// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory job store.
//
// One lock guards the whole map.  Critical sections are plain field
// assignments, never I/O, so a poisoned lock still holds consistent data
// and is recovered rather than propagated.  Readers always get clones.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, instrument};

use webprinter_core::types::{JobId, JobUpdate, PrintJob};

/// Concurrency-safe map from job id to job record.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: Mutex<HashMap<JobId, PrintJob>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, PrintJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a job.  The caller guarantees the id is fresh.
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    pub fn create(&self, job: PrintJob) -> PrintJob {
        let snapshot = job.clone();
        self.lock().insert(job.id, job);
        debug!("job created");
        snapshot
    }

    /// An independent copy of the job, if present.
    pub fn get(&self, id: &JobId) -> Option<PrintJob> {
        self.lock().get(id).cloned()
    }

    /// Apply `update` atomically and return the resulting copy.
    ///
    /// Unknown ids are a no-op returning `None`.
    pub fn update(&self, id: &JobId, update: JobUpdate) -> Option<PrintJob> {
        let mut jobs = self.lock();
        let job = jobs.get_mut(id)?;
        job.apply(update);
        Some(job.clone())
    }

    /// Copies of every job, newest first.
    pub fn list(&self) -> Vec<PrintJob> {
        let mut jobs: Vec<PrintJob> = self.lock().values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
