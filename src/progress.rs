//! Progress reporting for the importer
//!
//! Everything here writes to stderr: stdout is reserved for the JSON
//! document.

use crate::export::StoreCopySummary;
use crate::import::{ImportSummary, TableReport};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner shown while external tools run
///
/// Clones share the same spinner.
#[derive(Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Print a line above the spinner
    pub fn println(&self, line: impl AsRef<str>) {
        self.bar.println(line);
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// One-line description of a table extraction
pub fn format_table_report(report: &TableReport) -> String {
    let line = format!(
        "  {:<20} {:>10} rows  {:>7.2}s",
        report.table.name(),
        format_number(report.rows as u64),
        report.elapsed.as_secs_f64()
    );
    match &report.warning {
        Some(_) => format!("{} {}", line, style("(skipped)").yellow()),
        None => line,
    }
}

/// Print a header at the start of the import
pub fn print_header(input: &str, output: &str) {
    eprintln!();
    eprintln!(
        "{} {}",
        style("sdf-importer").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    eprintln!("{}", style("─".repeat(50)).dim());
    eprintln!("  {} {}", style("Source:").bold(), input);
    eprintln!("  {} {}", style("Output:").bold(), output);
    eprintln!();
}

/// Print a summary of a document-mode import
pub fn print_import_summary(summary: &ImportSummary) {
    eprintln!();
    eprintln!("{}", style("Import Complete").green().bold());
    eprintln!("{}", style("─".repeat(50)).dim());
    if let Some(conversion) = &summary.conversion {
        eprintln!(
            "  {} {} fragments, {} SQL (export {:.1}s, load {:.1}s)",
            style("Conversion:").bold(),
            conversion.fragments,
            format_size(conversion.script_bytes, BINARY),
            conversion.export_duration.as_secs_f64(),
            conversion.load_duration.as_secs_f64()
        );
    }
    eprintln!(
        "  {} {}",
        style("Tables:").bold(),
        summary.reports.len()
    );
    eprintln!(
        "  {} {}",
        style("Total Rows:").bold(),
        format_number(summary.total_rows as u64)
    );
    eprintln!(
        "  {} {:.1}s",
        style("Duration:").bold(),
        summary.duration.as_secs_f64()
    );
    let warnings = summary.warnings().count();
    if warnings > 0 {
        eprintln!(
            "  {} {}",
            style("Skipped Tables:").yellow().bold(),
            warnings
        );
    }
    eprintln!();
}

/// Print a summary of a store-copy export
pub fn print_store_summary(summary: &StoreCopySummary, db_path: &str) {
    eprintln!();
    eprintln!("{}", style("Export Complete").green().bold());
    eprintln!("{}", style("─".repeat(50)).dim());
    for (table, rows) in &summary.tables {
        match rows {
            Some(rows) => eprintln!("  {:<20} {:>10} rows", table.name(), format_number(*rows)),
            None => eprintln!("  {:<20} {:>10}", table.name(), style("missing").yellow()),
        }
    }
    eprintln!(
        "  {} {}",
        style("Tables processed:").bold(),
        summary.tables_processed
    );
    eprintln!(
        "  {} {}",
        style("Total rows:").bold(),
        format_number(summary.total_rows)
    );
    eprintln!(
        "  {} {:.2}s",
        style("Elapsed:").bold(),
        summary.duration.as_secs_f64()
    );
    eprintln!(
        "  {} {} ({})",
        style("Database:").bold(),
        db_path,
        format_size(summary.file_size, BINARY)
    );
    eprintln!();
}
