// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command handlers for the `webprinter` binary.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info};

use webprinter_core::config::AppConfig;
use webprinter_core::error::Result;
use webprinter_core::types::{JobStatus, PrintJob, PrinterStatusSnapshot};
use webprinter_print::PrintService;

use crate::services::{config_file, data_dir, staging};

/// How often a running job is re-read while following it.
const FOLLOW_INTERVAL: Duration = Duration::from_millis(250);

/// Raw `print` arguments as typed by the user.
#[derive(Debug)]
pub struct PrintRequest {
    pub file: PathBuf,
    pub printer: Option<String>,
    pub copies: u32,
    pub color: String,
    pub duplex: bool,
}

#[derive(Serialize)]
struct PrinterList {
    printers: Vec<String>,
    default: Option<String>,
}

fn fail(e: impl std::fmt::Display) -> ExitCode {
    eprintln!("error: {e}");
    ExitCode::FAILURE
}

fn write_json<T: Serialize>(value: &T) -> serde_json::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match write_json(value) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

pub async fn printers(service: &PrintService, json: bool) -> ExitCode {
    let printers = match service.enumerate_printers().await {
        Ok(printers) => printers,
        Err(e) => return fail(e),
    };
    let default = service.resolve_default().await.ok().flatten();

    if json {
        return print_json(&PrinterList { printers, default });
    }
    if printers.is_empty() {
        println!("No printers available.");
    }
    for name in &printers {
        let marker = if default.as_deref() == Some(name.as_str()) { "*" } else { " " };
        println!("{marker} {name}");
    }
    ExitCode::SUCCESS
}

pub async fn status(service: &PrintService, printer: Option<&str>, json: bool) -> ExitCode {
    let printer = match service.resolve_printer(printer).await {
        Ok(Some(printer)) => printer,
        Ok(None) => return fail("No printer available."),
        Err(e) => return fail(e),
    };
    match service.status(&printer).await {
        Ok(snapshot) if json => print_json(&snapshot),
        Ok(snapshot) => {
            print!("{}", render_status(&snapshot));
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

/// Human-readable status report.
fn render_status(snapshot: &PrinterStatusSnapshot) -> String {
    let yes_no = |flag: Option<bool>| match flag {
        Some(true) => "yes",
        Some(false) => "no",
        None => "unknown",
    };

    let mut out = format!("{}: {}\n", snapshot.printer, snapshot.state.label());
    out.push_str(&format!("  {}\n", snapshot.message));
    out.push_str(&format!("  enabled: {}\n", yes_no(snapshot.enabled)));
    out.push_str(&format!("  accepting jobs: {}\n", yes_no(snapshot.accepting_jobs)));
    out.push_str(&format!("  queued jobs: {}\n", snapshot.queue_length));
    if let Some(uri) = &snapshot.device_uri {
        out.push_str(&format!("  device: {uri}\n"));
    }
    if !snapshot.reasons.is_empty() {
        out.push_str(&format!("  alerts: {}\n", snapshot.reasons.join(", ")));
    }
    for level in &snapshot.toner_levels {
        let percent = level
            .percent
            .map(|p| format!("{p}%"))
            .unwrap_or_else(|| "unknown".to_string());
        out.push_str(&format!("  {} ({:?}): {percent}\n", level.name, level.color_key()));
    }
    if let Some(note) = &snapshot.toner_note {
        out.push_str(&format!("  {note}\n"));
    }
    out
}

pub async fn print(
    service: &PrintService,
    root: &Path,
    request: PrintRequest,
    json: bool,
) -> ExitCode {
    let job = match submit(service, root, &request).await {
        Ok(job) => job,
        Err(e) => return fail(e),
    };
    info!(job_id = %job.id, "following job");

    let done = follow(service, job, json).await;
    if json {
        if let Err(e) = write_json(&done) {
            return fail(e);
        }
    }
    match job_outcome(&done) {
        Ok(()) => ExitCode::SUCCESS,
        Err(detail) => {
            error!(job_id = %done.id, %detail, "print failed");
            fail(detail)
        }
    }
}

/// `Err` with the user-facing detail unless the job completed.
fn job_outcome(done: &PrintJob) -> std::result::Result<(), String> {
    match done.status {
        JobStatus::Completed => Ok(()),
        _ => Err(done.error.clone().unwrap_or_else(|| done.message.clone())),
    }
}

async fn submit(service: &PrintService, root: &Path, request: &PrintRequest) -> Result<PrintJob> {
    let options = service
        .build_options(request.printer.as_deref(), request.copies, &request.color, request.duplex)
        .await?;
    let uploads = data_dir::subdir(root, "uploads");
    let staged = staging::stage_file(&request.file, &uploads)?;
    service
        .submit_named(staged, staging::display_name(&request.file), options)
        .await
}

/// Re-read the job until it is terminal, printing each change.
async fn follow(service: &PrintService, mut job: PrintJob, quiet: bool) -> PrintJob {
    let mut last = None;
    loop {
        let seen = (job.status, job.progress, job.message.clone());
        if !quiet && last.as_ref() != Some(&seen) {
            println!("[{:>3}%] {:<9} {}", job.progress, job.status.label(), job.message);
        }
        last = Some(seen);

        if job.is_terminal() {
            return job;
        }
        tokio::time::sleep(FOLLOW_INTERVAL).await;
        match service.snapshot(&job.id) {
            Some(current) => job = current,
            None => return job,
        }
    }
}

pub fn show_config(config: &AppConfig, path: &Path, write: bool) -> ExitCode {
    if write {
        if let Err(e) = config_file::persist_config(path, config) {
            return fail(e);
        }
        eprintln!("settings written to {}", path.display());
    }
    print_json(config)
}
