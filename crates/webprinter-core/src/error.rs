// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for WebPrinter.
//
// Backend and validation messages are shown to users as-is, so their
// `Display` output is the message itself with no prefix.

use thiserror::Error;

/// Top-level error type for all WebPrinter operations.
#[derive(Debug, Error)]
pub enum WebPrinterError {
    // -- Spooler errors --
    /// An external print command failed, was missing, or produced output we
    /// could not use.  The string is the display-ready diagnostic.
    #[error("{0}")]
    Backend(String),

    /// No backend could be constructed at startup.  Carries the boot error.
    #[error("{0}")]
    BackendUnavailable(String),

    // -- Submission errors --
    /// A caller-supplied option was rejected before any command ran.
    #[error("{0}")]
    Validation(String),

    #[error("the print pipeline is not accepting jobs")]
    PipelineClosed,

    // -- Document errors --
    #[error("document rendering failed: {0}")]
    Render(String),

    // -- Storage --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WebPrinterError {
    /// Shorthand for a [`WebPrinterError::Backend`] built from anything printable.
    pub fn backend(detail: impl Into<String>) -> Self {
        Self::Backend(detail.into())
    }

    /// Shorthand for a [`WebPrinterError::Validation`].
    pub fn validation(detail: impl Into<String>) -> Self {
        Self::Validation(detail.into())
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, WebPrinterError>;
