// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: the local plumbing the print service expects from its
// front end: a data directory, persisted settings, and staged uploads.

pub mod config_file;
pub mod data_dir;
pub mod staging;
