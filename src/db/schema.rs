//! Column introspection and binary-column filtering
//!
//! Tables exported from SDF files carry embedded images, drawings and
//! workbook streams. Those columns are dropped before any row is read,
//! either because their name looks like a payload or because their
//! declared type is a binary one.

use crate::error::{DbError, DbResult};
use rusqlite::Connection;
use tracing::{debug, warn};

/// Column name fragments that mark a binary payload (case-insensitive)
pub const BLOB_NAME_DENYLIST: &[&str] = &[
    "image",
    "thumbnail",
    "picture",
    "photo",
    "bitmap",
    "stream",
    "binary",
    "blob",
    "workbook",
];

/// Declared type fragments that mark a binary column (case-insensitive)
pub const BINARY_TYPE_KEYWORDS: &[&str] = &["blob", "binary", "varbinary", "image"];

/// A column as declared in the table schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub declared_type: String,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
        }
    }
}

/// Outcome of filtering one table's columns
#[derive(Debug, Default)]
pub struct ColumnSelection {
    /// Surviving column names, in schema order
    pub allowed: Vec<String>,

    /// Dropped column names, in schema order
    pub excluded: Vec<String>,

    /// Set when the table could not be introspected
    pub warning: Option<DbError>,
}

/// Read column names and declared types in physical order
///
/// A missing table yields an empty list, not an error.
pub fn introspect_columns(conn: &Connection, table: &str) -> DbResult<Vec<ColumnDescriptor>> {
    let mut stmt = conn.prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")?;
    let columns = stmt
        .query_map([table], |row| {
            Ok(ColumnDescriptor {
                name: row.get(0)?,
                declared_type: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(columns)
}

/// Check whether a column holds binary content
///
/// The name rule and the type rule are independent: either one excludes.
pub fn is_binary_column(column: &ColumnDescriptor) -> bool {
    contains_any(&column.name, BLOB_NAME_DENYLIST)
        || contains_any(&column.declared_type, BINARY_TYPE_KEYWORDS)
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    let haystack = haystack.to_ascii_lowercase();
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Split already-introspected columns into allowed and excluded names
pub fn partition_columns(columns: &[ColumnDescriptor]) -> (Vec<String>, Vec<String>) {
    let mut allowed = Vec::with_capacity(columns.len());
    let mut excluded = Vec::new();

    for column in columns {
        if is_binary_column(column) {
            excluded.push(column.name.clone());
        } else {
            allowed.push(column.name.clone());
        }
    }

    (allowed, excluded)
}

/// Determine which columns of `table` may be extracted
///
/// Never fails: introspection errors and missing tables produce an empty
/// selection carrying a recoverable warning.
pub fn allowed_columns(conn: &Connection, table: &str) -> ColumnSelection {
    let columns = match introspect_columns(conn, table) {
        Ok(columns) if columns.is_empty() => {
            return unreadable(table, "no such table or table has no columns".to_string());
        }
        Ok(columns) => columns,
        Err(e) => return unreadable(table, e.to_string()),
    };

    let (allowed, excluded) = partition_columns(&columns);
    if !excluded.is_empty() {
        debug!("Table '{}': excluding binary columns {:?}", table, excluded);
    }

    ColumnSelection {
        allowed,
        excluded,
        warning: None,
    }
}

fn unreadable(table: &str, reason: String) -> ColumnSelection {
    let warning = DbError::TableUnreadable {
        table: table.to_string(),
        reason,
    };
    warn!("Warning: {}", warning);

    ColumnSelection {
        warning: Some(warning),
        ..ColumnSelection::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE Parts (
                Id INTEGER PRIMARY KEY,
                Name TEXT,
                Stream BLOB,
                Data BLOB,
                Thumbnail TEXT,
                Width REAL,
                Drawing VARBINARY(8000),
                Logo image,
                Comments ntext
            );",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_introspect_columns_in_order() {
        let conn = parts_db();
        let columns = introspect_columns(&conn, "Parts").unwrap();

        assert_eq!(columns.len(), 9);
        assert_eq!(columns[0], ColumnDescriptor::new("Id", "INTEGER"));
        assert_eq!(columns[6], ColumnDescriptor::new("Drawing", "VARBINARY(8000)"));
    }

    #[test]
    fn test_blob_type_excluded_regardless_of_name() {
        assert!(is_binary_column(&ColumnDescriptor::new("Data", "BLOB")));
        assert!(is_binary_column(&ColumnDescriptor::new("Data", "blob")));
        assert!(is_binary_column(&ColumnDescriptor::new("Payload", "varbinary(max)")));
        assert!(is_binary_column(&ColumnDescriptor::new("Logo", "Image")));
    }

    #[test]
    fn test_name_rule_independent_of_type() {
        assert!(is_binary_column(&ColumnDescriptor::new("Thumbnail", "TEXT")));
        assert!(is_binary_column(&ColumnDescriptor::new("WorkbookData", "nvarchar(100)")));
        assert!(is_binary_column(&ColumnDescriptor::new("PartIMAGE", "")));
        assert!(!is_binary_column(&ColumnDescriptor::new("Name", "TEXT")));
        assert!(!is_binary_column(&ColumnDescriptor::new("Quantity", "INTEGER")));
    }

    #[test]
    fn test_allowed_columns() {
        let conn = parts_db();
        let selection = allowed_columns(&conn, "Parts");

        assert!(selection.warning.is_none());
        assert_eq!(selection.allowed, vec!["Id", "Name", "Width", "Comments"]);
        assert_eq!(
            selection.excluded,
            vec!["Stream", "Data", "Thumbnail", "Drawing", "Logo"]
        );
    }

    #[test]
    fn test_allowed_columns_is_deterministic() {
        let conn = parts_db();
        let first = allowed_columns(&conn, "Parts").allowed;
        let second = allowed_columns(&conn, "Parts").allowed;
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_table_is_warning() {
        let conn = parts_db();
        let selection = allowed_columns(&conn, "Hardware");

        assert!(selection.allowed.is_empty());
        let warning = selection.warning.unwrap();
        assert!(warning.is_recoverable());
        assert!(warning.to_string().contains("Hardware"));
    }

    #[test]
    fn test_untyped_column_allowed() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE Hardware (Id, Description);").unwrap();

        let selection = allowed_columns(&conn, "Hardware");
        assert_eq!(selection.allowed, vec!["Id", "Description"]);
    }
}
