//! SDF conversion module
//!
//! Turns a SQL Server Compact file into a SQLite store using two external
//! tools, with the temporary SQL artifacts cleaned up on every exit path.
//!
//! # Module Structure
//!
//! - `script`: fragment discovery, combining, temporary-file guard
//! - `sdf`: export/load pipeline driving the external tools

pub mod script;
pub mod sdf;

pub use script::{combine_fragments, find_fragments, CombineStats, TempArtifact};
pub use sdf::{
    default_loader_name, is_sdf, ConvertState, ConvertStats, ConvertedStore, ConverterConfig,
    SdfConverter, ToolSpec, COMBINED_SCRIPT_NAME, DEFAULT_EXPORTER, DEFAULT_EXPORT_TIMEOUT,
    DEFAULT_LOAD_TIMEOUT, WORK_BASE_NAME, WORK_STORE_NAME,
};
