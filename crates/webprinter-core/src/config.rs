// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable that points at a SumatraPDF executable.
pub const SUMATRA_PATH_ENV: &str = "SUMATRA_PDF_PATH";

/// Application settings, read from `config.json` in the data directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Number of background workers running print jobs.
    pub worker_count: usize,
    /// Upper bound for the copies option.
    pub max_copies: u32,
    /// Wall-clock limit for a single SumatraPDF submission.
    pub submission_timeout_secs: u64,
    /// How many times the CUPS queue is checked after `lp` returns.
    pub queue_poll_attempts: u32,
    /// Delay before each CUPS queue check.
    pub queue_poll_interval_ms: u64,
    /// Explicit SumatraPDF location (checked before the install defaults).
    pub sumatra_path: Option<PathBuf>,
    /// Candidate locations of the `get-printer-attributes.test` ipptool file.
    pub ipptool_test_paths: Vec<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            worker_count: 2,
            max_copies: 99,
            submission_timeout_secs: 180,
            queue_poll_attempts: 12,
            queue_poll_interval_ms: 1000,
            sumatra_path: None,
            ipptool_test_paths: vec![
                PathBuf::from("/usr/share/cups/ipptool/get-printer-attributes.test"),
                PathBuf::from("/usr/local/share/cups/ipptool/get-printer-attributes.test"),
            ],
        }
    }
}

impl AppConfig {
    /// Apply overrides from the process environment.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(path) = std::env::var_os(SUMATRA_PATH_ENV).filter(|v| !v.is_empty()) {
            self.sumatra_path = Some(PathBuf::from(path));
        }
        self
    }

    pub fn submission_timeout(&self) -> Duration {
        Duration::from_secs(self.submission_timeout_secs)
    }

    pub fn queue_poll_interval(&self) -> Duration {
        Duration::from_millis(self.queue_poll_interval_ms)
    }
}
