//! SDF to SQLite conversion
//!
//! Two external tools do the real work:
//! 1. The exporter turns the `.sdf` file into SQL script fragments
//! 2. `sqlite3` reads the combined script into a fresh SQLite database
//!
//! All intermediate files live next to the input file:
//!
//! ```text
//! <dir>/input.sdf
//! <dir>/work_0000.sql ...   exporter output (consumed by combining)
//! <dir>/temp.sql            combined script (removed before returning)
//! <dir>/work.sqlite         resulting store
//! ```
//!
//! Only one conversion may run against a directory at a time.

use crate::convert::script::{combine_fragments, find_fragments, TempArtifact};
use crate::error::{ConvertError, ImportError, Result, ToolResult};
use crate::tool::ExternalTool;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Base name handed to the exporter; fragments are `<base>_NNNN.sql`
pub const WORK_BASE_NAME: &str = "work";

/// File name of the combined script
pub const COMBINED_SCRIPT_NAME: &str = "temp.sql";

/// File name of the rebuilt store
pub const WORK_STORE_NAME: &str = "work.sqlite";

/// Default exporter executable name
pub const DEFAULT_EXPORTER: &str = "ExportSqlCe40.exe";

/// Default exporter timeout
pub const DEFAULT_EXPORT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default loader timeout
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Default loader executable name for this platform
pub fn default_loader_name() -> String {
    format!("sqlite3{}", std::env::consts::EXE_SUFFIX)
}

/// Check whether a path names an SDF file (by extension)
pub fn is_sdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("sdf"))
}

/// Where an external tool lives and how to start it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: String,
    pub path: PathBuf,
    pub launcher: Option<PathBuf>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            launcher: None,
        }
    }

    pub fn with_launcher(mut self, launcher: impl Into<PathBuf>) -> Self {
        self.launcher = Some(launcher.into());
        self
    }

    /// Resolve to a runnable tool, failing if anything is missing
    pub fn locate(&self) -> ToolResult<ExternalTool> {
        match &self.launcher {
            Some(launcher) => ExternalTool::with_launcher(&self.name, launcher, &self.path),
            None => ExternalTool::locate(&self.name, &self.path),
        }
    }
}

/// Converter settings
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    pub exporter: ToolSpec,
    pub loader: ToolSpec,
    pub export_timeout: Duration,
    pub load_timeout: Duration,
    /// Optional third exporter argument
    pub export_hint: Option<String>,
}

impl ConverterConfig {
    /// Default tool names inside `tools_dir`
    pub fn from_tools_dir(tools_dir: &Path) -> Self {
        let loader = default_loader_name();
        Self {
            exporter: ToolSpec::new(DEFAULT_EXPORTER, tools_dir.join(DEFAULT_EXPORTER)),
            loader: ToolSpec::new(loader.clone(), tools_dir.join(loader)),
            export_timeout: DEFAULT_EXPORT_TIMEOUT,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            export_hint: None,
        }
    }
}

/// Conversion progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertState {
    NeedsExport,
    NeedsLoad,
    Ready,
}

/// Statistics from a conversion run
#[derive(Debug, Clone, Default)]
pub struct ConvertStats {
    pub fragments: usize,
    pub script_bytes: u64,
    pub export_duration: Duration,
    pub load_duration: Duration,
}

/// A freshly built SQLite store
#[derive(Debug, Clone)]
pub struct ConvertedStore {
    pub path: PathBuf,
    pub stats: ConvertStats,
}

/// File layout for one conversion
#[derive(Debug, Clone)]
struct WorkPaths {
    dir: PathBuf,
    base: PathBuf,
    script: PathBuf,
    store: PathBuf,
}

impl WorkPaths {
    fn for_input(input: &Path) -> Result<Self> {
        let dir = match input.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => std::env::current_dir().map_err(|_| ConvertError::NoWorkingDirectory {
                path: input.to_path_buf(),
            })?,
        };

        Ok(Self {
            base: dir.join(WORK_BASE_NAME),
            script: dir.join(COMBINED_SCRIPT_NAME),
            store: dir.join(WORK_STORE_NAME),
            dir,
        })
    }

    fn fragment_prefix() -> String {
        format!("{}_", WORK_BASE_NAME)
    }
}

/// Runs the export and load steps for one SDF file
pub struct SdfConverter {
    config: ConverterConfig,
}

impl SdfConverter {
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    /// Convert `sdf_path` into `<dir>/work.sqlite`
    ///
    /// The combined script is removed on every exit path. An existing
    /// `work.sqlite` is replaced, never merged into.
    pub fn convert(&self, sdf_path: &Path) -> Result<ConvertedStore> {
        if !sdf_path.is_file() {
            return Err(ImportError::InputNotFound(sdf_path.to_path_buf()));
        }

        let paths = WorkPaths::for_input(sdf_path)?;
        let script = TempArtifact::new(&paths.script);
        let mut stats = ConvertStats::default();
        let mut state = ConvertState::NeedsExport;

        loop {
            debug!("Conversion state: {:?}", state);
            state = match state {
                ConvertState::NeedsExport => {
                    self.export(sdf_path, &paths, script.path(), &mut stats)?;
                    ConvertState::NeedsLoad
                }
                ConvertState::NeedsLoad => {
                    self.load(&paths.store, script.path(), &mut stats)?;
                    ConvertState::Ready
                }
                ConvertState::Ready => break,
            };
        }

        info!(
            "Converted {} to {} ({} fragments, {} bytes of SQL)",
            sdf_path.display(),
            paths.store.display(),
            stats.fragments,
            stats.script_bytes
        );

        Ok(ConvertedStore {
            path: paths.store,
            stats,
        })
    }

    /// Run the exporter and combine its fragments into `script`
    fn export(&self, sdf_path: &Path, paths: &WorkPaths, script: &Path, stats: &mut ConvertStats) -> Result<()> {
        let exporter = self.config.exporter.locate()?;

        let mut data_source = OsString::from("Data Source=");
        data_source.push(sdf_path.as_os_str());
        data_source.push(";");

        let mut args = vec![data_source, paths.base.clone().into_os_string()];
        if let Some(hint) = &self.config.export_hint {
            args.push(OsString::from(hint));
        }

        info!("Exporting {} with {}", sdf_path.display(), exporter.name());
        let start = Instant::now();
        exporter.run(&args, self.config.export_timeout)?;
        stats.export_duration = start.elapsed();

        let prefix = WorkPaths::fragment_prefix();
        let fragments = find_fragments(&paths.dir, &prefix)?;
        if fragments.is_empty() {
            return Err(ConvertError::ExportProducedNoOutput {
                directory: paths.dir.clone(),
                prefix,
            }
            .into());
        }

        let combined = combine_fragments(&fragments, script)?;
        stats.fragments = combined.fragments;
        stats.script_bytes = combined.bytes;
        debug!("Combined {} fragments into {}", combined.fragments, script.display());

        Ok(())
    }

    /// Rebuild `store` from `script` with the loader
    fn load(&self, store: &Path, script: &Path, stats: &mut ConvertStats) -> Result<()> {
        let loader = self.config.loader.locate()?;

        if store.exists() {
            debug!("Removing existing store {}", store.display());
            fs::remove_file(store)?;
        }

        // Whatever the loader leaves behind is removed unless it succeeds.
        let partial = TempArtifact::new(store);

        info!("Loading {} into {}", script.display(), store.display());
        let start = Instant::now();
        loader.run(
            [store.as_os_str().to_os_string(), read_command(script)],
            self.config.load_timeout,
        )?;
        stats.load_duration = start.elapsed();

        partial.persist();
        Ok(())
    }
}

/// Build the loader's `.read` dot-command for `script`
///
/// The shell splits dot-command arguments on whitespace. Single quotes keep
/// the path verbatim (backslashes included) but cannot contain a quote, so
/// such a path is double-quoted with `\\` and `\"` escaped instead.
fn read_command(script: &Path) -> OsString {
    let path = script.to_string_lossy();
    let quoted = if path.contains('\'') {
        format!("\"{}\"", path.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        format!("'{}'", path)
    };
    OsString::from(format!(".read {}", quoted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_is_sdf() {
        assert!(is_sdf(Path::new("job.sdf")));
        assert!(is_sdf(Path::new("/data/JOB.SDF")));
        assert!(!is_sdf(Path::new("job.sqlite")));
        assert!(!is_sdf(Path::new("job")));
        assert!(!is_sdf(Path::new("sdf")));
    }

    #[test]
    fn test_work_paths_next_to_input() {
        let paths = WorkPaths::for_input(Path::new("/data/jobs/job.sdf")).unwrap();
        assert_eq!(paths.dir, PathBuf::from("/data/jobs"));
        assert_eq!(paths.base, PathBuf::from("/data/jobs/work"));
        assert_eq!(paths.script, PathBuf::from("/data/jobs/temp.sql"));
        assert_eq!(paths.store, PathBuf::from("/data/jobs/work.sqlite"));
    }

    #[test]
    fn test_work_paths_bare_file_name() {
        let paths = WorkPaths::for_input(Path::new("job.sdf")).unwrap();
        assert_eq!(paths.dir, std::env::current_dir().unwrap());
    }

    #[test]
    fn test_read_command_quotes_path() {
        assert_eq!(
            read_command(Path::new("/data/My Jobs/temp.sql")),
            OsString::from(".read '/data/My Jobs/temp.sql'")
        );
        assert_eq!(
            read_command(Path::new(r"C:\Users\Jane Doe\temp.sql")),
            OsString::from(r".read 'C:\Users\Jane Doe\temp.sql'")
        );
        assert_eq!(
            read_command(Path::new(r#"/data/O'Brien "A"\temp.sql"#)),
            OsString::from(r#".read "/data/O'Brien \"A\"\\temp.sql""#)
        );
    }

    #[test]
    fn test_convert_missing_input() {
        let dir = tempdir().unwrap();
        let converter = SdfConverter::new(ConverterConfig::from_tools_dir(dir.path()));

        let err = converter.convert(&dir.path().join("missing.sdf")).unwrap_err();
        assert!(matches!(err, ImportError::InputNotFound(_)));
    }

    #[test]
    fn test_convert_missing_exporter() {
        let dir = tempdir().unwrap();
        let sdf = dir.path().join("job.sdf");
        fs::write(&sdf, b"not really sdf").unwrap();

        let converter = SdfConverter::new(ConverterConfig::from_tools_dir(&dir.path().join("native")));
        let err = converter.convert(&sdf).unwrap_err();

        match err {
            ImportError::Tool(crate::error::ToolError::NotFound { tool, path }) => {
                assert_eq!(tool, DEFAULT_EXPORTER);
                assert_eq!(path, dir.path().join("native").join(DEFAULT_EXPORTER));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!dir.path().join(COMBINED_SCRIPT_NAME).exists());
    }
}
