// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Windows backend: SumatraPDF submits documents, PowerShell queries the
// spooler.
//
// SumatraPDF only prints page-description formats, so `.txt` input is laid
// out as a PDF first.  The spooler does not expose consumables through this
// path and no job id is returned, so there is nothing to poll.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, instrument};

use webprinter_core::config::AppConfig;
use webprinter_core::error::{Result, WebPrinterError};
use webprinter_core::types::{PrintOptions, PrinterStatusSnapshot};
use webprinter_document::TextPdfRenderer;

use crate::backend::{PrinterBackend, ProgressSink, check_printer_name, check_submission};
use crate::command::{CommandOutput, CommandRunner, to_args};
use crate::status;

const POWERSHELL: &str = "powershell";

/// Default SumatraPDF install locations, checked after the configured path.
const INSTALL_LOCATIONS: [&str; 2] = [
    r"C:\Program Files\SumatraPDF\SumatraPDF.exe",
    r"C:\Program Files (x86)\SumatraPDF\SumatraPDF.exe",
];

const LIST_SCRIPT: &str = "Get-Printer | Select-Object -ExpandProperty Name";

const DEFAULT_SCRIPT: &str = "(Get-CimInstance Win32_Printer | \
     Where-Object {$_.Default -eq $true} | \
     Select-Object -First 1 -ExpandProperty Name)";

/// Locate SumatraPDF: the configured path first, then the install defaults.
pub fn find_sumatra(config: &AppConfig) -> Option<PathBuf> {
    config
        .sumatra_path
        .iter()
        .cloned()
        .chain(INSTALL_LOCATIONS.into_iter().map(PathBuf::from))
        .find(|candidate| candidate.exists())
}

/// Quote `value` as a single-quoted PowerShell literal.
fn ps_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn status_script(printer: &str) -> String {
    format!(
        "$name = {}; \
         $printer = Get-Printer -Name $name -ErrorAction Stop; \
         $jobs = @(Get-PrintJob -PrinterName $name -ErrorAction SilentlyContinue); \
         [PSCustomObject]@{{Name=$printer.Name; PrinterStatus=$printer.PrinterStatus; \
         WorkOffline=$printer.WorkOffline; Comment=$printer.Comment; \
         PortName=$printer.PortName; QueueLength=$jobs.Count}} | ConvertTo-Json -Compress",
        ps_literal(printer)
    )
}

/// Comma-joined SumatraPDF `-print-settings` value.
fn print_settings(options: &PrintOptions) -> String {
    format!(
        "{}x,{},{}",
        options.copies,
        if options.color { "color" } else { "monochrome" },
        if options.duplex { "duplexlong" } else { "simplex" },
    )
}

fn is_plain_text(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
}

/// Build a snapshot from the compact JSON record emitted by the status script.
fn snapshot_from_payload(printer: &str, raw: &str) -> Result<PrinterStatusSnapshot> {
    let raw = raw.trim();
    let payload: Value = if raw.is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(raw).map_err(|e| {
            WebPrinterError::backend(format!("Invalid printer status response: {e}"))
        })?
    };

    let raw_state = match payload.get("PrinterStatus") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(code)) => code.to_string(),
        _ => "unknown".to_string(),
    };
    let offline = match payload.get("WorkOffline") {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        Some(Value::String(s)) => !s.is_empty(),
        _ => false,
    };
    let message = payload
        .get("Comment")
        .and_then(Value::as_str)
        .filter(|comment| !comment.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Windows status: {raw_state}"));
    let queue_length = match payload.get("QueueLength") {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()).unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    };
    let device_uri = payload
        .get("PortName")
        .and_then(Value::as_str)
        .filter(|port| !port.is_empty())
        .map(str::to_string);

    Ok(PrinterStatusSnapshot {
        printer: printer.to_string(),
        state: status::map_windows_state(&raw_state, offline),
        message,
        enabled: Some(true),
        accepting_jobs: None,
        queue_length,
        device_uri,
        reasons: if offline { vec!["offline".to_string()] } else { Vec::new() },
        toner_levels: Vec::new(),
        toner_note: Some("Toner levels are not available on the Windows backend.".into()),
    })
}

/// Printer backend for Windows hosts with SumatraPDF installed.
pub struct SumatraBackend {
    runner: Arc<dyn CommandRunner>,
    executable: PathBuf,
    timeout: Duration,
    renderer: TextPdfRenderer,
}

impl SumatraBackend {
    /// Build the backend, failing if SumatraPDF cannot be found.
    pub fn new(runner: Arc<dyn CommandRunner>, config: &AppConfig) -> Result<Self> {
        let executable = find_sumatra(config).ok_or_else(|| {
            WebPrinterError::backend(
                "SumatraPDF is required on Windows. \
                 Set SUMATRA_PDF_PATH or install SumatraPDF.",
            )
        })?;
        info!(path = %executable.display(), "using SumatraPDF");
        Ok(Self::with_executable(runner, executable, config))
    }

    pub fn with_executable(
        runner: Arc<dyn CommandRunner>,
        executable: PathBuf,
        config: &AppConfig,
    ) -> Self {
        Self {
            runner,
            executable,
            timeout: config.submission_timeout(),
            renderer: TextPdfRenderer::default(),
        }
    }

    async fn powershell(&self, script: &str) -> Result<CommandOutput> {
        let args = to_args(&["-NoProfile", "-Command", script]);
        self.runner.run(POWERSHELL, &args, None).await
    }
}

#[async_trait]
impl PrinterBackend for SumatraBackend {
    fn name(&self) -> &'static str {
        "sumatra"
    }

    #[instrument(skip(self))]
    async fn list_printers(&self) -> Result<Vec<String>> {
        let output = self.powershell(LIST_SCRIPT).await?;
        if !output.success() {
            let detail = output.stderr.trim();
            let detail = if detail.is_empty() { "unable to read printers." } else { detail };
            return Err(WebPrinterError::backend(format!("Error loading printers: {detail}")));
        }

        let mut printers: Vec<String> = Vec::new();
        for name in output.stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if !printers.iter().any(|p| p == name) {
                printers.push(name.to_string());
            }
        }
        Ok(printers)
    }

    async fn default_printer(&self) -> Option<String> {
        let output = self.powershell(DEFAULT_SCRIPT).await.ok()?;
        if !output.success() {
            return None;
        }
        let name = output.stdout.trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    #[instrument(skip(self, options, progress), fields(printer = %options.printer))]
    async fn print_file(
        &self,
        path: &Path,
        options: &PrintOptions,
        progress: &dyn ProgressSink,
    ) -> Result<Option<String>> {
        check_submission(path, options)?;

        // Held until the end of the call; dropping it deletes the render.
        let rendered = if is_plain_text(path) {
            let target = tempfile::Builder::new()
                .prefix("webprinter_text_")
                .suffix(".pdf")
                .tempfile()?;
            self.renderer.render_file_to(path, target.path())?;
            debug!(render = %target.path().display(), "text document rendered");
            Some(target)
        } else {
            None
        };
        let source = rendered.as_ref().map_or(path, |file| file.path());

        let mut args = to_args(&["-silent", "-print-to"]);
        args.push(options.printer.clone());
        args.push("-print-settings".to_string());
        args.push(print_settings(options));
        args.push(source.to_string_lossy().into_owned());

        progress.report(45, "Sending the document to the Windows print system.");
        let program = self.executable.to_string_lossy();
        let result = self.runner.run(&program, &args, Some(self.timeout)).await;
        drop(rendered);

        let output = result
            .map_err(|e| WebPrinterError::backend(format!("SumatraPDF failed to print: {e}")))?;
        if !output.success() {
            let detail = output.diagnostic("unknown error");
            return Err(WebPrinterError::backend(format!("SumatraPDF failed to print: {detail}")));
        }

        progress.report(90, "Document handed to the spooler service.");
        Ok(None)
    }

    #[instrument(skip(self))]
    async fn get_status(&self, printer: &str) -> Result<PrinterStatusSnapshot> {
        check_printer_name(printer)?;

        let output = self.powershell(&status_script(printer)).await?;
        if !output.success() {
            let detail = output.stderr.trim();
            let detail = if detail.is_empty() { "unable to read the printer status." } else { detail };
            return Err(WebPrinterError::backend(detail));
        }
        snapshot_from_payload(printer, &output.stdout)
    }
}
