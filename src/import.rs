//! Import orchestration
//!
//! Resolves the input to a SQLite store (converting `.sdf` files first),
//! then extracts the six known tables in a fixed order over a single
//! connection. A table that cannot be read comes back empty with a
//! warning; it never stops the other tables.

use crate::convert::{is_sdf, ConvertStats, ConverterConfig, SdfConverter};
use crate::db::{extract_table, Row, StoreHandle};
use crate::error::{DbError, ImportError, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::info;

/// The tables extracted from every store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Products,
    Parts,
    PlacedSheets,
    Hardware,
    Subassemblies,
    OptimizationResults,
}

impl Table {
    /// Every table, in extraction order
    pub const ALL: [Table; 6] = [
        Table::Products,
        Table::Parts,
        Table::PlacedSheets,
        Table::Hardware,
        Table::Subassemblies,
        Table::OptimizationResults,
    ];

    /// Table name in the store
    pub fn name(self) -> &'static str {
        match self {
            Table::Products => "Products",
            Table::Parts => "Parts",
            Table::PlacedSheets => "PlacedSheets",
            Table::Hardware => "Hardware",
            Table::Subassemblies => "Subassemblies",
            Table::OptimizationResults => "OptimizationResults",
        }
    }

    /// Field name in the JSON document
    pub fn json_key(self) -> &'static str {
        match self {
            Table::Products => "products",
            Table::Parts => "parts",
            Table::PlacedSheets => "placedSheets",
            Table::Hardware => "hardware",
            Table::Subassemblies => "subassemblies",
            Table::OptimizationResults => "optimizationResults",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Rows from all six tables; every field is always present
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub products: Vec<Row>,
    pub parts: Vec<Row>,
    pub placed_sheets: Vec<Row>,
    pub hardware: Vec<Row>,
    pub subassemblies: Vec<Row>,
    pub optimization_results: Vec<Row>,
}

impl ImportResult {
    pub fn rows(&self, table: Table) -> &[Row] {
        match table {
            Table::Products => &self.products,
            Table::Parts => &self.parts,
            Table::PlacedSheets => &self.placed_sheets,
            Table::Hardware => &self.hardware,
            Table::Subassemblies => &self.subassemblies,
            Table::OptimizationResults => &self.optimization_results,
        }
    }

    pub fn rows_mut(&mut self, table: Table) -> &mut Vec<Row> {
        match table {
            Table::Products => &mut self.products,
            Table::Parts => &mut self.parts,
            Table::PlacedSheets => &mut self.placed_sheets,
            Table::Hardware => &mut self.hardware,
            Table::Subassemblies => &mut self.subassemblies,
            Table::OptimizationResults => &mut self.optimization_results,
        }
    }

    pub fn total_rows(&self) -> usize {
        Table::ALL.iter().map(|t| self.rows(*t).len()).sum()
    }
}

/// Outcome of extracting one table
#[derive(Debug)]
pub struct TableReport {
    pub table: Table,
    pub rows: usize,
    pub elapsed: Duration,
    pub warning: Option<DbError>,
}

/// Totals for a whole extraction
#[derive(Debug, Default)]
pub struct ImportSummary {
    pub reports: Vec<TableReport>,
    pub total_rows: usize,
    pub duration: Duration,
    pub conversion: Option<ConvertStats>,
}

impl ImportSummary {
    /// Tables that produced a warning
    pub fn warnings(&self) -> impl Iterator<Item = &TableReport> {
        self.reports.iter().filter(|r| r.warning.is_some())
    }
}

/// Result of a full import
#[derive(Debug)]
pub struct ImportOutcome {
    pub result: ImportResult,
    pub summary: ImportSummary,
}

/// Called after each table is extracted
pub type ProgressCallback = Box<dyn Fn(&TableReport)>;

/// A store ready to be read, plus conversion stats if one was built
#[derive(Debug)]
pub struct PreparedStore {
    pub handle: StoreHandle,
    pub conversion: Option<ConvertStats>,
}

/// Drives conversion and extraction for one input file
pub struct Importer {
    converter: SdfConverter,
    keep_work_store: bool,
}

impl Importer {
    pub fn new(converter: ConverterConfig, keep_work_store: bool) -> Self {
        Self {
            converter: SdfConverter::new(converter),
            keep_work_store,
        }
    }

    /// Resolve `input` to a SQLite store
    ///
    /// `.sdf` files are converted to a work store owned by the returned
    /// handle; anything else is taken to be SQLite already and left alone.
    pub fn prepare_store(&self, input: &Path) -> Result<PreparedStore> {
        if !input.is_file() {
            return Err(ImportError::InputNotFound(input.to_path_buf()));
        }

        if is_sdf(input) {
            let converted = self.converter.convert(input)?;
            Ok(PreparedStore {
                handle: StoreHandle::owned(converted.path, self.keep_work_store),
                conversion: Some(converted.stats),
            })
        } else {
            Ok(PreparedStore {
                handle: StoreHandle::existing(input),
                conversion: None,
            })
        }
    }

    /// Convert if needed, then extract all tables
    pub fn import(&self, input: &Path, progress: Option<ProgressCallback>) -> Result<ImportOutcome> {
        let start = Instant::now();
        let store = self.prepare_store(input)?;
        let conn = store.handle.open()?;

        let (result, mut summary) = extract_all(&conn, progress);
        summary.conversion = store.conversion;
        summary.duration = start.elapsed();

        Ok(ImportOutcome { result, summary })
    }
}

/// Extract every table in `Table::ALL` order
pub fn extract_all(conn: &Connection, progress: Option<ProgressCallback>) -> (ImportResult, ImportSummary) {
    let start = Instant::now();
    let mut result = ImportResult::default();
    let mut summary = ImportSummary::default();

    for table in Table::ALL {
        let table_start = Instant::now();
        let extract = extract_table(conn, table.name());
        let report = TableReport {
            table,
            rows: extract.rows.len(),
            elapsed: table_start.elapsed(),
            warning: extract.warning,
        };

        info!(
            table = table.name(),
            rows = report.rows,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Extracted table"
        );
        if let Some(ref callback) = progress {
            callback(&report);
        }

        summary.total_rows += report.rows;
        *result.rows_mut(table) = extract.rows;
        summary.reports.push(report);
    }

    summary.duration = start.elapsed();
    (result, summary)
}
