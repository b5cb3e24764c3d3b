//! Configuration types for sdf-importer
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - Output target detection from the output file extension

use crate::convert::{default_loader_name, ConverterConfig, ToolSpec, DEFAULT_EXPORTER};
use crate::error::ConfigError;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Extensions that select store-copy output
const STORE_EXTENSIONS: &[&str] = &["sqlite", "sqlite3", "db"];

/// Extensions that select JSON document output
const DOCUMENT_EXTENSIONS: &[&str] = &["json"];

/// Extract known tables from SQL Server Compact (.sdf) or SQLite files
#[derive(Parser, Debug, Clone)]
#[command(
    name = "sdf-importer",
    version,
    about = "Extract known tables from SQL Server Compact (.sdf) or SQLite files",
    long_about = "Converts a .sdf file to SQLite using ExportSqlCe40 and sqlite3, then extracts\n\
                  the Products, Parts, PlacedSheets, Hardware, Subassemblies and\n\
                  OptimizationResults tables. Binary columns (images, streams, workbooks)\n\
                  are left out of the JSON document.",
    after_help = "EXAMPLES:\n    \
        sdf-importer job.sdf > job.json\n    \
        sdf-importer job.sdf -o job.json\n    \
        sdf-importer job.sdf -o job.sqlite      # Full SQLite copy\n    \
        sdf-importer job.sqlite -o job.json     # Already SQLite, no conversion\n    \
        sdf-importer --self-check"
)]
pub struct CliArgs {
    /// Path to a .sdf or SQLite file
    #[arg(value_name = "INPUT", required_unless_present = "self_check")]
    pub input: Option<PathBuf>,

    /// Output file (.json for a document, .sqlite/.db for a store copy; stdout if omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Directory containing the exporter and sqlite3
    #[arg(long, value_name = "DIR", env = "SDF_IMPORTER_TOOLS_DIR")]
    pub tools_dir: Option<PathBuf>,

    /// Explicit exporter path (overrides --tools-dir)
    #[arg(long, value_name = "PATH")]
    pub exporter: Option<PathBuf>,

    /// Explicit sqlite3 path (overrides --tools-dir)
    #[arg(long, value_name = "PATH")]
    pub loader: Option<PathBuf>,

    /// Program used to start the exporter (e.g. mono or wine)
    #[arg(long, value_name = "PATH")]
    pub launcher: Option<PathBuf>,

    /// Extra format argument passed to the exporter
    #[arg(long, value_name = "HINT")]
    pub export_hint: Option<String>,

    /// Exporter timeout in seconds
    #[arg(long, default_value = "60", value_name = "SECS")]
    pub export_timeout: u64,

    /// sqlite3 timeout in seconds
    #[arg(long, default_value = "10", value_name = "SECS")]
    pub load_timeout: u64,

    /// Keep the intermediate work.sqlite next to the input
    #[arg(long)]
    pub keep_work_db: bool,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Verify the JSON document structure on built-in samples and exit
    #[arg(long, conflicts_with = "input")]
    pub self_check: bool,
}

/// Where the import result goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// JSON document on stdout
    Stdout,
    /// JSON document file
    JsonFile(PathBuf),
    /// Full SQLite store copy
    Store(PathBuf),
}

impl OutputTarget {
    /// Determine the output target from the file extension
    pub fn from_path(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(OutputTarget::Stdout);
        };
        if path.as_os_str() == "-" {
            return Ok(OutputTarget::Stdout);
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if DOCUMENT_EXTENSIONS.contains(&extension.as_str()) {
            Ok(OutputTarget::JsonFile(path.to_path_buf()))
        } else if STORE_EXTENSIONS.contains(&extension.as_str()) {
            Ok(OutputTarget::Store(path.to_path_buf()))
        } else {
            Err(ConfigError::InvalidOutputPath {
                path: path.to_path_buf(),
                reason: "expected a .json, .sqlite, .sqlite3 or .db extension".to_string(),
            })
        }
    }

    /// Output file path, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            OutputTarget::Stdout => None,
            OutputTarget::JsonFile(path) | OutputTarget::Store(path) => Some(path),
        }
    }

    /// Human-readable description for the header
    pub fn describe(&self) -> String {
        match self {
            OutputTarget::Stdout => "stdout (JSON)".to_string(),
            OutputTarget::JsonFile(path) => format!("{} (JSON)", path.display()),
            OutputTarget::Store(path) => format!("{} (SQLite)", path.display()),
        }
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Input file (.sdf or SQLite)
    pub input: PathBuf,

    /// Output target
    pub output: OutputTarget,

    /// External tool settings
    pub converter: ConverterConfig,

    /// Keep the intermediate work store
    pub keep_work_store: bool,

    /// Show progress indicator and summary
    pub show_progress: bool,
}

impl ImportConfig {
    /// Create and validate configuration from CLI arguments
    ///
    /// The input path's existence is checked by the importer, not here, so
    /// that a missing input surfaces as `InputNotFound`.
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let input = args.input.clone().ok_or(ConfigError::MissingInput)?;
        let output = OutputTarget::from_path(args.output.as_deref())?;

        // Validate output path
        if let Some(path) = output.path() {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(ConfigError::InvalidOutputPath {
                        path: path.to_path_buf(),
                        reason: format!("Parent directory '{}' does not exist", parent.display()),
                    });
                }
            }
        }

        let export_timeout = validate_timeout("export", args.export_timeout)?;
        let load_timeout = validate_timeout("load", args.load_timeout)?;

        let tools_dir = args.tools_dir.clone().unwrap_or_else(default_tools_dir);
        let mut exporter = ToolSpec::new(
            DEFAULT_EXPORTER,
            args.exporter.clone().unwrap_or_else(|| tools_dir.join(DEFAULT_EXPORTER)),
        );
        if let Some(launcher) = args.launcher.clone() {
            exporter = exporter.with_launcher(launcher);
        }
        let loader_name = default_loader_name();
        let loader = ToolSpec::new(
            loader_name.clone(),
            args.loader.clone().unwrap_or_else(|| tools_dir.join(&loader_name)),
        );

        Ok(Self {
            input,
            output,
            converter: ConverterConfig {
                exporter,
                loader,
                export_timeout,
                load_timeout,
                export_hint: args.export_hint,
            },
            keep_work_store: args.keep_work_db,
            show_progress: !args.quiet,
        })
    }
}

fn validate_timeout(name: &'static str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::InvalidTimeout { name, secs });
    }
    Ok(Duration::from_secs(secs))
}

/// `native/` next to the running executable
fn default_tools_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("native")))
        .unwrap_or_else(|| PathBuf::from("native"))
}
