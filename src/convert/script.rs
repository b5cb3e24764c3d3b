//! SQL fragment combining
//!
//! The exporter writes its output as numbered fragment files sharing a
//! prefix (`work_0000.sql`, `work_0001.sql`, ...). They are concatenated in
//! file-name order into a single script that the loader can `.read`.
//!
//! Fragments must be named so that lexicographic order is statement order.

use crate::error::{ConvertError, ConvertResult};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extension every fragment must carry
pub const FRAGMENT_EXTENSION: &str = "sql";

/// Statistics from combining fragments
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CombineStats {
    pub fragments: usize,
    pub bytes: u64,
}

/// Find fragment files in `dir` named `<prefix>*.sql`, sorted by file name
pub fn find_fragments(dir: &Path, prefix: &str) -> ConvertResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| ConvertError::CombineFailed {
        path: dir.to_path_buf(),
        reason: format!("cannot list directory: {}", e),
    })?;

    let mut fragments: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_fragment(path, prefix))
        .collect();

    // Compare file names only; every path shares the same directory.
    fragments.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(fragments)
}

fn is_fragment(path: &Path, prefix: &str) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let has_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(FRAGMENT_EXTENSION));

    name.starts_with(prefix) && has_extension
}

/// Concatenate `fragments` in order into `output`, deleting each one once
/// its contents have been written
///
/// Every fragment is followed by exactly one newline. If writing fails
/// part-way, fragments not yet consumed stay on disk.
pub fn combine_fragments(fragments: &[PathBuf], output: &Path) -> ConvertResult<CombineStats> {
    let fail = |reason: String| ConvertError::CombineFailed {
        path: output.to_path_buf(),
        reason,
    };

    let file = File::create(output).map_err(|e| fail(e.to_string()))?;
    let mut writer = BufWriter::new(file);
    let mut stats = CombineStats::default();

    for fragment in fragments {
        let content = fs::read(fragment)
            .map_err(|e| fail(format!("cannot read '{}': {}", fragment.display(), e)))?;

        writer
            .write_all(&content)
            .and_then(|_| writer.write_all(b"\n"))
            .and_then(|_| writer.flush())
            .map_err(|e| fail(e.to_string()))?;

        fs::remove_file(fragment)
            .map_err(|e| fail(format!("cannot remove '{}': {}", fragment.display(), e)))?;

        stats.fragments += 1;
        stats.bytes += content.len() as u64 + 1;
        debug!("Consumed fragment {}", fragment.display());
    }

    writer
        .into_inner()
        .map_err(|e| fail(e.to_string()))?
        .sync_all()
        .map_err(|e| fail(e.to_string()))?;

    Ok(stats)
}

/// Temporary file that is removed when the guard goes out of scope,
/// unless it has been persisted
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
    armed: bool,
}

impl TempArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the file and hand back its path
    pub fn persist(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if self.armed && self.path.exists() {
            match fs::remove_file(&self.path) {
                Ok(()) => debug!("Removed temporary file {}", self.path.display()),
                Err(e) => warn!(
                    "Failed to remove temporary file {}: {}",
                    self.path.display(),
                    e
                ),
            }
        }
    }
}
