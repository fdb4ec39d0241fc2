// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// webprinter-print: spooler backends, job tracking, and the background
// print pipeline.
//
// Backends:
// - CUPS (`lp`/`lpstat`, consumables via `ipptool`)
// - Windows (SumatraPDF for submission, PowerShell for queries)

pub mod backend;
pub mod command;
pub mod cups;
pub mod pipeline;
pub mod selector;
pub mod service;
pub mod status;
pub mod store;
pub mod sumatra;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{BackendHandle, NoProgress, PrinterBackend, ProgressSink};
pub use command::{CommandOutput, CommandRunner, SystemRunner};
pub use cups::CupsBackend;
pub use pipeline::{JobProgress, PrintPipeline};
pub use selector::{HostPlatform, select_backend};
pub use service::PrintService;
pub use store::JobStore;
pub use sumatra::SumatraBackend;
