// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// One-time backend selection at startup.

use std::sync::Arc;

use tracing::{info, warn};

use webprinter_core::config::AppConfig;

use crate::backend::BackendHandle;
use crate::command::CommandRunner;
use crate::cups::{self, CupsBackend};
use crate::sumatra::SumatraBackend;

/// Shown when no spooler variant applies to this host.
pub const NO_BACKEND_MESSAGE: &str =
    "No print backend available. Install CUPS (lp/lpstat) or use Windows with SumatraPDF.";

/// Host family, as far as backend selection cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    Windows,
    Other,
}

impl HostPlatform {
    pub fn current() -> Self {
        if cfg!(windows) { Self::Windows } else { Self::Other }
    }
}

/// Inspect the host and construct exactly one backend.
///
/// CUPS wins whenever its tools are present; Windows hosts fall back to
/// SumatraPDF.  Construction failures are captured in the handle instead of
/// aborting startup.
pub fn select_backend(
    runner: Arc<dyn CommandRunner>,
    config: &AppConfig,
    platform: HostPlatform,
) -> BackendHandle {
    let handle = if cups::REQUIRED_TOOLS.iter().all(|tool| runner.is_available(tool)) {
        match CupsBackend::new(runner, config) {
            Ok(backend) => BackendHandle::Ready(Arc::new(backend)),
            Err(e) => BackendHandle::Unavailable(e.to_string()),
        }
    } else if platform == HostPlatform::Windows {
        match SumatraBackend::new(runner, config) {
            Ok(backend) => BackendHandle::Ready(Arc::new(backend)),
            Err(e) => BackendHandle::Unavailable(e.to_string()),
        }
    } else {
        BackendHandle::Unavailable(NO_BACKEND_MESSAGE.to_string())
    };

    match &handle {
        BackendHandle::Ready(backend) => info!(backend = backend.name(), "print backend ready"),
        BackendHandle::Unavailable(reason) => warn!(%reason, "no print backend"),
    }
    handle
}
