// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Upload staging.
//
// The print service takes ownership of the file it is given and deletes it
// when the job ends, so the user's document is copied into the uploads
// directory first under a collision-free name.

use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use webprinter_core::error::{Result, WebPrinterError};

/// Copy `source` into `uploads` and return the staged path.
pub fn stage_file(source: &Path, uploads: &Path) -> Result<PathBuf> {
    if !source.is_file() {
        return Err(WebPrinterError::validation(format!(
            "File not found: {}",
            source.display()
        )));
    }
    let name = display_name(source);
    let target = uploads.join(format!("{}_{}", Uuid::new_v4().simple(), name));
    std::fs::copy(source, &target)?;
    debug!(source = %source.display(), staged = %target.display(), "file staged");
    Ok(target)
}

/// The name shown for a job: the source file name.
pub fn display_name(source: &Path) -> String {
    source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}
