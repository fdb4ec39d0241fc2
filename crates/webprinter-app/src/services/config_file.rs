// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Config file persistence.

use std::path::Path;

use tracing::{debug, warn};

use webprinter_core::config::AppConfig;
use webprinter_core::error::Result;

pub const CONFIG_FILE: &str = "config.json";

/// Read `path`, falling back to defaults when it is missing or invalid.
/// Environment overrides are applied either way.
pub fn load_config(path: &Path) -> AppConfig {
    let config = match std::fs::read_to_string(path) {
        Ok(data) => match serde_json::from_str::<AppConfig>(&data) {
            Ok(config) => {
                debug!(path = %path.display(), "config loaded");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "invalid config, using defaults");
                AppConfig::default()
            }
        },
        Err(_) => AppConfig::default(),
    };
    config.with_env_overrides()
}

/// Write `config` as pretty JSON.
pub fn persist_config(path: &Path, config: &AppConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}
