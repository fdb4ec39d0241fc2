// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The printer backend capability shared by every spooler variant.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use webprinter_core::error::{Result, WebPrinterError};
use webprinter_core::types::{PrintOptions, PrinterStatusSnapshot};

/// Receives sub-stage progress from a backend while a file is submitted.
///
/// Implementations are bound to one job; the backend only ever sees
/// `report`.
pub trait ProgressSink: Send + Sync {
    /// `percent` is in `0..=99`; larger values are clamped by the receiver.
    fn report(&self, percent: u8, message: &str);
}

/// A sink that drops every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _percent: u8, _message: &str) {}
}

/// Operations every spooler variant provides.
///
/// Instances are shared read-only between workers and hold no per-call
/// state.
#[async_trait]
pub trait PrinterBackend: Send + Sync {
    /// Short variant name for logs.
    fn name(&self) -> &'static str;

    /// Installed printer names.  An empty list means "no printers".
    async fn list_printers(&self) -> Result<Vec<String>>;

    /// The system default printer, if one can be discovered.
    async fn default_printer(&self) -> Option<String>;

    /// Submit `path` for printing and return the spooler's job id, if any.
    ///
    /// Returning means the spooler took the job, not that paper came out.
    async fn print_file(
        &self,
        path: &Path,
        options: &PrintOptions,
        progress: &dyn ProgressSink,
    ) -> Result<Option<String>>;

    /// A fresh status snapshot for `printer`.
    async fn get_status(&self, printer: &str) -> Result<PrinterStatusSnapshot>;
}

/// Checks shared by every variant before anything is spawned.
pub(crate) fn check_submission(path: &Path, options: &PrintOptions) -> Result<()> {
    if !path.exists() {
        return Err(WebPrinterError::backend("The file to print does not exist."));
    }
    if options.copies < 1 {
        return Err(WebPrinterError::backend("Invalid number of copies."));
    }
    Ok(())
}

pub(crate) fn check_printer_name(printer: &str) -> Result<()> {
    if printer.trim().is_empty() {
        return Err(WebPrinterError::backend("No printer selected."));
    }
    Ok(())
}

/// The process-wide backend, or the reason there is none.
#[derive(Clone)]
pub enum BackendHandle {
    Ready(Arc<dyn PrinterBackend>),
    /// Boot failed; the string is shown to users verbatim.
    Unavailable(String),
}

impl BackendHandle {
    pub fn backend(&self) -> Result<&Arc<dyn PrinterBackend>> {
        match self {
            Self::Ready(backend) => Ok(backend),
            Self::Unavailable(reason) => Err(WebPrinterError::BackendUnavailable(reason.clone())),
        }
    }

    pub fn boot_error(&self) -> Option<&str> {
        match self {
            Self::Ready(_) => None,
            Self::Unavailable(reason) => Some(reason),
        }
    }
}

impl std::fmt::Debug for BackendHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(backend) => f.debug_tuple("Ready").field(&backend.name()).finish(),
            Self::Unavailable(reason) => f.debug_tuple("Unavailable").field(reason).finish(),
        }
    }
}
