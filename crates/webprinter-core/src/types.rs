// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for WebPrinter.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::WebPrinterError;

/// Unique identifier for a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Colour mode requested for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Black and white.
    Bw,
    Color,
}

impl ColorMode {
    pub fn is_color(&self) -> bool {
        matches!(self, Self::Color)
    }
}

impl FromStr for ColorMode {
    type Err = WebPrinterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bw" => Ok(Self::Bw),
            "color" => Ok(Self::Color),
            _ => Err(WebPrinterError::validation("Invalid color mode: use 'bw' or 'color'.")),
        }
    }
}

/// Options handed to a backend for a single submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintOptions {
    /// Target printer (queue) name.
    pub printer: String,
    pub copies: u32,
    pub color: bool,
    pub duplex: bool,
}

impl PrintOptions {
    pub fn new(printer: impl Into<String>, copies: u32, color: bool, duplex: bool) -> Self {
        Self {
            printer: printer.into(),
            copies,
            color,
            duplex,
        }
    }

    pub fn color_mode(&self) -> ColorMode {
        if self.color { ColorMode::Color } else { ColorMode::Bw }
    }
}

/// Lifecycle states of a print job.
///
/// `Queued → Preparing → Printing → {Completed | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted, waiting for a worker.
    Queued,
    /// A worker picked the job up.
    Preparing,
    /// The backend is submitting or tracking the job.
    Printing,
    /// The spooler accepted the job.
    Completed,
    /// Printing failed; see the job's error field.
    Failed,
}

impl JobStatus {
    /// Whether no further state changes may happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Queued => "Queued",
            Self::Preparing => "Preparing",
            Self::Printing => "Printing",
            Self::Completed => "Completed",
            Self::Failed => "Error",
        }
    }
}

/// A print job tracked by the job store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: JobId,
    /// Name shown to the user (the original upload name).
    pub filename: String,
    /// Staged file to print.  Deleted by the pipeline once the job is terminal.
    pub stored_path: Option<PathBuf>,
    pub printer: String,
    pub color_mode: ColorMode,
    pub copies: u32,
    pub duplex: bool,
    pub status: JobStatus,
    /// Percentage in `0..=100`.
    pub progress: u8,
    pub message: String,
    pub error: Option<String>,
    /// Identifier assigned by the spooler, when it reports one.
    pub printer_job_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PrintJob {
    /// Progress recorded for a freshly queued job.
    pub const QUEUED_PROGRESS: u8 = 8;

    /// Build a new job in the `Queued` state.
    pub fn queued(filename: impl Into<String>, stored_path: PathBuf, options: &PrintOptions) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            filename: filename.into(),
            stored_path: Some(stored_path),
            printer: options.printer.clone(),
            color_mode: options.color_mode(),
            copies: options.copies,
            duplex: options.duplex,
            status: JobStatus::Queued,
            progress: Self::QUEUED_PROGRESS,
            message: "File received, waiting to print.".into(),
            error: None,
            printer_job_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The backend options this job was submitted with.
    pub fn options(&self) -> PrintOptions {
        PrintOptions::new(
            self.printer.clone(),
            self.copies,
            self.color_mode.is_color(),
            self.duplex,
        )
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a partial update, enforcing the lifecycle invariants.
    ///
    /// Once terminal, only the message may change (cleanup bookkeeping).
    /// Progress never moves backwards while the job is live, stays below 100
    /// until a terminal state, and is pinned to 100 on entering one.
    pub fn apply(&mut self, update: JobUpdate) {
        if self.status.is_terminal() {
            if update.touches_lifecycle() {
                debug!(job_id = %self.id, status = ?self.status, "ignoring update to terminal job");
            }
            if let Some(message) = update.message {
                self.message = message;
                self.updated_at = Utc::now();
            }
            return;
        }

        if let Some(status) = update.status {
            self.status = status;
        }
        if self.status.is_terminal() {
            self.progress = 100;
        } else if let Some(progress) = update.progress {
            self.progress = self.progress.max(progress.min(99));
        }
        if let Some(message) = update.message {
            self.message = message;
        }
        if let Some(error) = update.error {
            self.error = error;
        }
        if let Some(printer_job_id) = update.printer_job_id {
            self.printer_job_id = printer_job_id;
        }
        self.updated_at = Utc::now();
    }
}

/// A set of field assignments applied atomically to a [`PrintJob`].
///
/// `None` leaves a field untouched; the nested options of `error` and
/// `printer_job_id` allow clearing them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub error: Option<Option<String>>,
    pub printer_job_id: Option<Option<String>>,
}

impl JobUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn error(mut self, error: Option<String>) -> Self {
        self.error = Some(error);
        self
    }

    pub fn printer_job_id(mut self, printer_job_id: Option<String>) -> Self {
        self.printer_job_id = Some(printer_job_id);
        self
    }

    fn touches_lifecycle(&self) -> bool {
        self.status.is_some()
            || self.progress.is_some()
            || self.error.is_some()
            || self.printer_job_id.is_some()
    }
}

/// Normalised printer state across spooler variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterState {
    Idle,
    Printing,
    Stopped,
    Unknown,
}

impl PrinterState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Ready",
            Self::Printing => "Printing",
            Self::Stopped => "Stopped",
            Self::Unknown => "Unknown",
        }
    }
}

/// Colour family of a consumable, used to pick a display swatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TonerColor {
    Black,
    Cyan,
    Magenta,
    Yellow,
    Generic,
}

/// Level of one consumable (toner, ink, drum...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TonerLevel {
    pub name: String,
    /// Remaining percentage, `None` when the device did not report a usable value.
    pub percent: Option<u8>,
    /// Colour as reported by the device (a keyword or `#RRGGBB`).
    pub color: Option<String>,
}

impl TonerLevel {
    pub fn color_key(&self) -> TonerColor {
        let reported = self.color.as_deref().unwrap_or("");
        let text = format!("{reported} {}", self.name).to_ascii_lowercase();
        if text.contains("black") {
            return TonerColor::Black;
        }
        if text.contains("cyan") {
            return TonerColor::Cyan;
        }
        if text.contains("magenta") {
            return TonerColor::Magenta;
        }
        if text.contains("yellow") {
            return TonerColor::Yellow;
        }
        match reported.trim().to_ascii_lowercase().as_str() {
            "#000000" => TonerColor::Black,
            "#00ffff" => TonerColor::Cyan,
            "#ff00ff" => TonerColor::Magenta,
            "#ffff00" => TonerColor::Yellow,
            _ => TonerColor::Generic,
        }
    }
}

/// Point-in-time view of a printer, built fresh on every status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterStatusSnapshot {
    pub printer: String,
    pub state: PrinterState,
    /// Raw status line for display.
    pub message: String,
    pub enabled: Option<bool>,
    pub accepting_jobs: Option<bool>,
    /// Jobs waiting in the printer's queue.
    pub queue_length: u32,
    pub device_uri: Option<String>,
    pub reasons: Vec<String>,
    pub toner_levels: Vec<TonerLevel>,
    /// Why consumable levels are missing, when they are.
    pub toner_note: Option<String>,
}
