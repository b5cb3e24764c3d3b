//! SQLite store access and lifecycle
//!
//! A store is either the user's own SQLite file, which is only ever read,
//! or a `work.sqlite` rebuilt by the converter, which this crate owns and
//! removes once the import is done.

use crate::convert::TempArtifact;
use crate::db::extract::quote_identifier;
use crate::error::{DbError, DbResult};
use rusqlite::{Connection, OpenFlags};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Open a store read-only and check that it really is a SQLite database
pub fn open_readonly(path: &Path) -> DbResult<Connection> {
    let open_failed = |reason: String| DbError::OpenFailed {
        path: path.to_path_buf(),
        reason,
    };

    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| open_failed(e.to_string()))?;

    // SQLite opens lazily; touching the schema surfaces "not a database".
    conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
        .map_err(|e| open_failed(e.to_string()))?;

    Ok(conn)
}

/// Count rows in `table`
pub fn count_rows(conn: &Connection, table: &str) -> DbResult<u64> {
    let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table));
    let count: i64 = conn
        .query_row(&sql, [], |row| row.get(0))
        .map_err(|e| DbError::TableUnreadable {
            table: table.to_string(),
            reason: e.to_string(),
        })?;
    Ok(count.max(0) as u64)
}

/// Replace `dest` with a byte copy of `source`, returning the file size
///
/// Copying a file onto itself is a no-op.
pub fn copy_store(source: &Path, dest: &Path) -> DbResult<u64> {
    let copy_failed = |reason: String| DbError::CopyFailed {
        source_path: source.to_path_buf(),
        dest: dest.to_path_buf(),
        reason,
    };

    if is_same_file(source, dest) {
        debug!("Destination {} is the source store, not copying", dest.display());
        return fs::metadata(dest)
            .map(|m| m.len())
            .map_err(|e| copy_failed(e.to_string()));
    }

    // Copy beside the destination first so a failed copy never replaces it.
    let partial = TempArtifact::new(partial_path(dest));
    let size = fs::copy(source, partial.path()).map_err(|e| copy_failed(e.to_string()))?;
    fs::rename(partial.path(), dest).map_err(|e| copy_failed(e.to_string()))?;
    Ok(size)
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// True when both paths resolve to the same existing file
pub fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// The store an import reads from
#[derive(Debug)]
pub struct StoreHandle {
    path: PathBuf,

    /// True when the store was built by this process
    owned: bool,

    /// Keep an owned store on disk after the handle is dropped
    keep: bool,
}

impl StoreHandle {
    /// Wrap a store supplied by the user; it is never deleted
    pub fn existing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            owned: false,
            keep: true,
        }
    }

    /// Wrap a freshly built store; it is deleted on drop unless `keep`
    pub fn owned(path: impl Into<PathBuf>, keep: bool) -> Self {
        Self {
            path: path.into(),
            owned: true,
            keep,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Keep an owned store on disk after the handle is dropped
    pub fn persist(&mut self) {
        self.keep = true;
    }

    /// Open the store read-only
    pub fn open(&self) -> DbResult<Connection> {
        open_readonly(&self.path)
    }
}

impl Drop for StoreHandle {
    fn drop(&mut self) {
        if !self.owned || self.keep || !self.path.exists() {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed work store {}", self.path.display()),
            Err(e) => warn!("Failed to remove work store {}: {}", self.path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_store(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE Products (Id INTEGER, Name TEXT);
             INSERT INTO Products VALUES (1, 'Cabinet'), (2, 'Drawer');",
        )
        .unwrap();
    }

    #[test]
    fn test_open_readonly_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bogus.sqlite");
        fs::write(&path, b"this is definitely not a sqlite database file").unwrap();

        let err = open_readonly(&path).unwrap_err();
        assert!(matches!(err, DbError::OpenFailed { .. }));
    }

    #[test]
    fn test_open_readonly_missing_file() {
        let dir = tempdir().unwrap();
        assert!(open_readonly(&dir.path().join("missing.sqlite")).is_err());
    }

    #[test]
    fn test_count_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("job.sqlite");
        make_store(&path);

        let conn = open_readonly(&path).unwrap();
        assert_eq!(count_rows(&conn, "Products").unwrap(), 2);
        assert!(count_rows(&conn, "Hardware").unwrap_err().is_recoverable());
    }

    #[test]
    fn test_copy_store_replaces_destination() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("work.sqlite");
        let dest = dir.path().join("out.sqlite");
        make_store(&source);
        fs::write(&dest, b"stale").unwrap();

        let size = copy_store(&source, &dest).unwrap();
        assert_eq!(size, fs::metadata(&source).unwrap().len());
        assert_eq!(fs::read(&source).unwrap(), fs::read(&dest).unwrap());
        assert!(!partial_path(&dest).exists());
    }

    #[test]
    fn test_failed_copy_keeps_destination() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out.sqlite");
        fs::write(&dest, b"previous").unwrap();

        let err = copy_store(&dir.path().join("missing.sqlite"), &dest).unwrap_err();
        assert!(matches!(err, DbError::CopyFailed { .. }));
        assert_eq!(fs::read(&dest).unwrap(), b"previous");
        assert!(!partial_path(&dest).exists());
    }

    #[test]
    fn test_copy_store_onto_itself() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("job.sqlite");
        make_store(&source);
        let before = fs::read(&source).unwrap();

        copy_store(&source, &source).unwrap();
        assert_eq!(fs::read(&source).unwrap(), before);
    }

    #[test]
    fn test_owned_store_removed_on_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("work.sqlite");
        make_store(&path);

        drop(StoreHandle::owned(&path, false));
        assert!(!path.exists());
    }

    #[test]
    fn test_persisted_store_survives_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("work.sqlite");
        make_store(&path);

        let mut handle = StoreHandle::owned(&path, false);
        handle.persist();
        drop(handle);
        assert!(path.exists());
    }

    #[test]
    fn test_kept_and_existing_stores_survive() {
        let dir = tempdir().unwrap();
        let work = dir.path().join("work.sqlite");
        let input = dir.path().join("job.sqlite");
        make_store(&work);
        make_store(&input);

        drop(StoreHandle::owned(&work, true));
        drop(StoreHandle::existing(&input));
        assert!(work.exists());
        assert!(input.exists());
    }
}
