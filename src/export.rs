//! Output writers
//!
//! Two terminal modes:
//! - Document: the six extracted tables as one pretty-printed JSON object,
//!   written to stdout or a file
//! - Store copy: the whole SQLite store copied to the destination, with
//!   per-table row counts read back for reporting

use crate::convert::TempArtifact;
use crate::db::{copy_store, count_rows, is_same_file, open_readonly, StoreHandle};
use crate::error::Result;
use crate::import::{ImportResult, Table};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Render the import result as a JSON document
pub fn render_document(result: &ImportResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// Write a rendered document to `path`, or to stdout when `path` is `None`
///
/// File output goes through a temporary sibling that is renamed into place,
/// so a failed write never leaves a truncated document behind.
pub fn write_document(document: &str, path: Option<&Path>) -> Result<()> {
    match path {
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(document.as_bytes())?;
            stdout.write_all(b"\n")?;
            stdout.flush()?;
        }
        Some(path) => {
            let partial = TempArtifact::new(partial_path(path));
            fs::write(partial.path(), format!("{}\n", document))?;
            fs::rename(partial.path(), path)?;
            info!("Wrote JSON document to {}", path.display());
        }
    }
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// Summary of a store copy
#[derive(Debug, Clone, Default)]
pub struct StoreCopySummary {
    /// Row count per table; `None` when the table is absent
    pub tables: Vec<(Table, Option<u64>)>,
    pub tables_processed: usize,
    pub total_rows: u64,
    pub duration: Duration,
    pub file_size: u64,
}

/// Copy `store` to `dest` and count the known tables in the copy
///
/// The copy is the full store; no columns are filtered in this mode. When
/// `dest` is the work store itself, the store is persisted so it outlives
/// the handle.
pub fn export_store(store: &mut StoreHandle, dest: &Path) -> Result<StoreCopySummary> {
    let start = Instant::now();
    let source = store.path().to_path_buf();
    if store.is_owned() && is_same_file(&source, dest) {
        info!("Output {} is the work store, keeping it", dest.display());
        store.persist();
    }

    let file_size = copy_store(&source, dest)?;
    info!("Copied {} to {}", source.display(), dest.display());

    let conn = open_readonly(dest)?;
    let mut summary = StoreCopySummary {
        file_size,
        ..Default::default()
    };

    for table in Table::ALL {
        match count_rows(&conn, table.name()) {
            Ok(rows) => {
                summary.tables_processed += 1;
                summary.total_rows += rows;
                summary.tables.push((table, Some(rows)));
            }
            Err(e) => {
                warn!("Warning: {}", e);
                summary.tables.push((table, None));
            }
        }
    }

    summary.duration = start.elapsed();
    Ok(summary)
}
