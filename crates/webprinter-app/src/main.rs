// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// WebPrinter: print documents through the local spooler and follow each
// job to completion.
//
// Entry point. Initialises logging, loads settings, selects the print
// backend, and dispatches the requested command.

mod commands;
mod services;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use webprinter_print::PrintService;

use services::config_file::{self, CONFIG_FILE};
use services::data_dir;

#[derive(Parser, Debug)]
#[command(name = "webprinter", version, about = "Print documents and track jobs through CUPS or the Windows spooler.")]
struct Cli {
    /// Settings file (defaults to config.json in the data directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List installed printers and the default one
    Printers,
    /// Show printer state, alerts, and toner levels
    Status {
        /// Printer to query (defaults to the system default)
        #[arg(short, long)]
        printer: Option<String>,
    },
    /// Print a file and follow the job until it finishes
    Print {
        file: PathBuf,
        #[arg(short, long)]
        printer: Option<String>,
        #[arg(short = 'n', long, default_value_t = 1)]
        copies: u32,
        /// "bw" or "color"
        #[arg(long, default_value = "bw")]
        color: String,
        /// Print on both sides (long edge)
        #[arg(long)]
        duplex: bool,
    },
    /// Show the effective settings, optionally writing them to the settings file
    Config {
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let data_dir = data_dir::data_dir();
    let config_path = cli.config.clone().unwrap_or_else(|| data_dir.join(CONFIG_FILE));
    let config = config_file::load_config(&config_path);

    tracing::info!(data_dir = %data_dir.display(), "WebPrinter starting");

    if let Command::Config { write } = cli.command {
        return commands::show_config(&config, &config_path, write);
    }

    let service = PrintService::from_host(config);
    if let Some(reason) = service.backend().boot_error() {
        tracing::error!(%reason, "print backend unavailable");
    }

    let code = match cli.command {
        Command::Printers => commands::printers(&service, cli.json).await,
        Command::Status { printer } => commands::status(&service, printer.as_deref(), cli.json).await,
        Command::Print {
            file,
            printer,
            copies,
            color,
            duplex,
        } => {
            let request = commands::PrintRequest {
                file,
                printer,
                copies,
                color,
                duplex,
            };
            commands::print(&service, &data_dir, request, cli.json).await
        }
        Command::Config { .. } => ExitCode::SUCCESS,
    };

    service.shutdown();
    code
}
