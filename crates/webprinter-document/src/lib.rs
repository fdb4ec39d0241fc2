// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// webprinter-document: document preparation for print helpers that only
// accept page-description input.

pub mod text_pdf;

pub use text_pdf::TextPdfRenderer;
