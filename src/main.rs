//! sdf-importer - SQL Server Compact to SQLite/JSON migration
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use sdf_importer::config::{CliArgs, ImportConfig, OutputTarget};
use sdf_importer::export::{export_store, render_document, write_document};
use sdf_importer::import::{Importer, ProgressCallback, TableReport};
use sdf_importer::progress::{
    format_table_report, print_header, print_import_summary, print_store_summary, ProgressReporter,
};
use sdf_importer::validate::{ensure_valid, run_self_check};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    if args.self_check {
        run_self_check().context("Self-check failed")?;
        eprintln!("Self-check passed");
        return Ok(());
    }

    // Validate and create config
    let config = ImportConfig::from_args(args).context("Invalid configuration")?;

    if config.show_progress {
        print_header(&config.input.display().to_string(), &config.output.describe());
    }

    let importer = Importer::new(config.converter.clone(), config.keep_work_store);

    match &config.output {
        OutputTarget::Store(dest) => run_store_copy(&config, &importer, dest),
        OutputTarget::Stdout | OutputTarget::JsonFile(_) => run_document(&config, &importer),
    }
}

/// Extract the six tables and write them as a JSON document
fn run_document(config: &ImportConfig, importer: &Importer) -> Result<()> {
    let progress = config.show_progress.then(ProgressReporter::new);
    if let Some(ref p) = progress {
        p.set_status("Reading tables...");
    }

    let callback: Option<ProgressCallback> = progress.clone().map(|p| {
        Box::new(move |report: &TableReport| p.println(format_table_report(report))) as ProgressCallback
    });

    let outcome = importer
        .import(&config.input, callback)
        .context("Import failed")?;

    if let Some(ref p) = progress {
        p.finish_and_clear();
    }

    let document = render_document(&outcome.result).context("Failed to serialize result")?;
    write_document(&document, config.output.path()).context("Failed to write document")?;

    if config.show_progress {
        print_import_summary(&outcome.summary);
    }

    // The document is already out; a bad structure still fails the run.
    ensure_valid(&document)?;

    info!(rows = outcome.summary.total_rows, "Import finished");
    Ok(())
}

/// Copy the (converted) store to `dest` and report row counts
fn run_store_copy(config: &ImportConfig, importer: &Importer, dest: &std::path::Path) -> Result<()> {
    let progress = config.show_progress.then(ProgressReporter::new);
    if let Some(ref p) = progress {
        p.set_status("Preparing SQLite store...");
    }

    let mut store = importer
        .prepare_store(&config.input)
        .context("Import failed")?;

    if let Some(ref p) = progress {
        p.set_status("Copying store...");
    }

    let summary = export_store(&mut store.handle, dest).context("Failed to export store")?;

    if let Some(ref p) = progress {
        p.finish_and_clear();
    }

    if config.show_progress {
        print_store_summary(&summary, &dest.display().to_string());
    }

    info!(
        tables = summary.tables_processed,
        rows = summary.total_rows,
        "Export finished"
    );
    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("sdf_importer=debug,warn")
    } else {
        EnvFilter::new("sdf_importer=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
