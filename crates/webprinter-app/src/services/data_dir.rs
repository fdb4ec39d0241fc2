// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-aware data directory resolution.

use std::path::{Path, PathBuf};

const APP_DIR: &str = "webprinter";

/// Return the application data directory, creating it if needed.
pub fn data_dir() -> PathBuf {
    let base = base_dir(
        std::env::var_os("XDG_DATA_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    );
    ensure(base.join(APP_DIR))
}

/// Return a subdirectory inside `root` (e.g. "uploads"), creating it if needed.
pub fn subdir(root: &Path, name: &str) -> PathBuf {
    ensure(root.join(name))
}

fn ensure(dir: PathBuf) -> PathBuf {
    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(path = %dir.display(), error = %e, "could not create directory");
    }
    dir
}

/// XDG data dir, then `~/.local/share`, then `/tmp`.
fn base_dir(xdg: Option<PathBuf>, home: Option<PathBuf>) -> PathBuf {
    if let Some(xdg) = xdg.filter(|p| !p.as_os_str().is_empty()) {
        return xdg;
    }
    if let Some(home) = home.filter(|p| !p.as_os_str().is_empty()) {
        return home.join(".local").join("share");
    }
    PathBuf::from("/tmp")
}
