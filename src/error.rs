//! Error types for sdf-importer
//!
//! This module defines the error hierarchy for the import pipeline:
//! - External tool errors (missing executable, failure, timeout)
//! - Conversion errors (export output, script combining)
//! - SQLite store errors
//! - Configuration and CLI errors
//!
//! Tool and I/O errors abort the whole import. `DbError::TableUnreadable`
//! is the one recoverable kind: it is downgraded to a warning for the
//! table it names and extraction carries on with the other tables.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for the importer
#[derive(Error, Debug)]
pub enum ImportError {
    /// Input file does not exist
    #[error("File not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// External tool errors
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// SDF conversion errors
    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Produced document failed the structural self-check
    #[error("JSON structure validation failed: {0}")]
    OutputStructureInvalid(String),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImportError {
    /// Check if this error only affects a single table
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ImportError::Database(e) if e.is_recoverable())
    }
}

/// External process errors
#[derive(Error, Debug, Clone)]
pub enum ToolError {
    /// Executable is not where it is expected
    #[error("{tool} not found at: {}", .path.display())]
    NotFound { tool: String, path: PathBuf },

    /// The OS refused to start the process
    #[error("Failed to start {tool}: {reason}")]
    SpawnFailed { tool: String, reason: String },

    /// Process exited with a non-zero status
    #[error("{tool} failed with exit code {}. Error: {stderr}", describe_code(.code))]
    Failed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Process ran past its deadline and was killed
    #[error("{tool} process timed out after {} seconds", .timeout.as_secs_f64())]
    Timeout { tool: String, timeout: Duration },

    /// Waiting on the process failed
    #[error("Failed waiting for {tool}: {reason}")]
    Wait { tool: String, reason: String },
}

impl ToolError {
    /// Name of the tool this error is about
    pub fn tool(&self) -> &str {
        match self {
            ToolError::NotFound { tool, .. }
            | ToolError::SpawnFailed { tool, .. }
            | ToolError::Failed { tool, .. }
            | ToolError::Timeout { tool, .. }
            | ToolError::Wait { tool, .. } => tool,
        }
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}

/// SDF to SQLite conversion errors
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Exporter succeeded but left no fragment files behind
    #[error("No files found with pattern {prefix}*.sql in directory {}", .directory.display())]
    ExportProducedNoOutput { directory: PathBuf, prefix: String },

    /// Could not determine where to put intermediate files
    #[error("Cannot determine working directory for '{}'", .path.display())]
    NoWorkingDirectory { path: PathBuf },

    /// Writing the combined script failed
    #[error("Failed to combine SQL fragments into '{}': {reason}", .path.display())]
    CombineFailed { path: PathBuf, reason: String },
}

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Store could not be opened or is not a SQLite database
    #[error("Failed to open database '{}': {reason}", .path.display())]
    OpenFailed { path: PathBuf, reason: String },

    /// Table is missing or could not be read
    #[error("Table '{table}' not found or error reading: {reason}")]
    TableUnreadable { table: String, reason: String },

    /// Store file copy failed
    #[error("Failed to copy database '{}' to '{}': {reason}", .source_path.display(), .dest.display())]
    CopyFailed {
        source_path: PathBuf,
        dest: PathBuf,
        reason: String,
    },
}

impl DbError {
    /// Check if this error is scoped to one table
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DbError::TableUnreadable { .. })
    }
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Output path error
    #[error("Invalid output path '{}': {reason}", .path.display())]
    InvalidOutputPath { path: PathBuf, reason: String },

    /// Zero or otherwise unusable timeout
    #[error("Invalid {name} timeout {secs}s: must be at least 1 second")]
    InvalidTimeout { name: &'static str, secs: u64 },

    /// No input path given
    #[error("An input file is required (path to .sdf or .sqlite file)")]
    MissingInput,
}

/// Result type alias for ImportError
pub type Result<T> = std::result::Result<T, ImportError>;

/// Result type alias for ToolError
pub type ToolResult<T> = std::result::Result<T, ToolError>;

/// Result type alias for ConvertError
pub type ConvertResult<T> = std::result::Result<T, ConvertError>;

/// Result type alias for DbError
pub type DbResult<T> = std::result::Result<T, DbError>;
