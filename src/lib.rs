//! sdf-importer - SQL Server Compact to SQLite/JSON migration
//!
//! Reads legacy `.sdf` job files by converting them to SQLite with two
//! external tools, then extracts a fixed set of business tables with
//! binary payload columns filtered out.
//!
//! # Features
//!
//! - **Tool orchestration**: Runs the SDF exporter and `sqlite3` with
//!   timeouts, killing and reaping a tool that hangs.
//!
//! - **Binary column filtering**: Columns that look like images, streams
//!   or workbooks (by name or declared type) are never queried.
//!
//! - **Failure isolation**: A missing or unreadable table yields an empty
//!   list and a warning; the other tables are still extracted.
//!
//! - **Two outputs**: A JSON document with six table arrays, or a full
//!   SQLite copy of the converted store.
//!
//! # Architecture
//!
//! ```text
//!   job.sdf                                     job.sqlite
//!      │                                            │
//!      ▼                                            │
//! ┌──────────────────────────┐                      │
//! │  ExportSqlCe40.exe       │ work_0000.sql ...    │
//! └────────────┬─────────────┘                      │
//!              ▼ combine (name order)               │
//! ┌──────────────────────────┐                      │
//! │  sqlite3 ".read temp.sql"│ ──▶ work.sqlite      │
//! └────────────┬─────────────┘                      │
//!              └──────────────────┬─────────────────┘
//!                                 ▼
//!                 ┌──────────────────────────────┐
//!                 │  Table Extractor (x6)        │
//!                 │  - pragma_table_info filter  │
//!                 │  - SELECT allowed columns    │
//!                 └──────────────┬───────────────┘
//!                                ▼
//!                  JSON document  |  SQLite copy
//! ```
//!
//! # Example
//!
//! ```bash
//! # JSON document on stdout
//! sdf-importer job.sdf > job.json
//!
//! # Full SQLite copy
//! sdf-importer job.sdf -o job.sqlite
//! ```

pub mod config;
pub mod convert;
pub mod db;
pub mod error;
pub mod export;
pub mod import;
pub mod progress;
pub mod tool;
pub mod validate;

pub use config::{CliArgs, ImportConfig, OutputTarget};
pub use error::{ImportError, Result};
pub use import::{ImportOutcome, ImportResult, Importer, Table};
