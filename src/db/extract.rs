//! Row extraction for a single table
//!
//! Queries only the columns the schema filter allowed, so binary payloads
//! are never fetched from the store. Any failure is confined to the table
//! being read.

use crate::db::schema::allowed_columns;
use crate::error::{DbError, DbResult};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use tracing::{debug, warn};

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    fn from_sql(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
            // Blob cells can still turn up in a text-declared column.
            ValueRef::Blob(_) => Value::Null,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// One table row: column names mapped to values, in column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: Vec::with_capacity(capacity),
        }
    }

    /// Set a column, replacing the value if the column is already present
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.cells.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.insert(column, value);
        }
        row
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, value) in &self.cells {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Rows read from one table
#[derive(Debug, Default)]
pub struct TableExtract {
    pub rows: Vec<Row>,

    /// Set when the table was skipped or only partly usable
    pub warning: Option<DbError>,
}

/// Quote an SQL identifier, doubling any embedded quotes
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Build a query selecting exactly `columns` from `table`
pub fn projection_query(table: &str, columns: &[String]) -> String {
    let projection = columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");

    format!("SELECT {} FROM {}", projection, quote_identifier(table))
}

/// Extract the non-binary columns of every row in `table`
///
/// A missing or unreadable table yields an empty extract with a warning.
pub fn extract_table(conn: &Connection, table: &str) -> TableExtract {
    let selection = allowed_columns(conn, table);
    if selection.allowed.is_empty() {
        // The schema filter has already logged its own warning.
        let warning = selection.warning.unwrap_or_else(|| {
            let warning = DbError::TableUnreadable {
                table: table.to_string(),
                reason: "no extractable columns".to_string(),
            };
            warn!("Warning: {}", warning);
            warning
        });
        return TableExtract {
            rows: Vec::new(),
            warning: Some(warning),
        };
    }

    match query_rows(conn, table, &selection.allowed) {
        Ok(rows) => {
            debug!("Read {} rows from '{}'", rows.len(), table);
            TableExtract { rows, warning: None }
        }
        Err(e) => {
            let warning = DbError::TableUnreadable {
                table: table.to_string(),
                reason: e.to_string(),
            };
            warn!("Warning: {}", warning);
            TableExtract {
                rows: Vec::new(),
                warning: Some(warning),
            }
        }
    }
}

fn query_rows(conn: &Connection, table: &str, columns: &[String]) -> DbResult<Vec<Row>> {
    let sql = projection_query(table, columns);
    let mut stmt = conn.prepare(&sql)?;

    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();

    while let Some(sql_row) = rows.next()? {
        let mut row = Row::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            let value = sql_row.get_ref(idx)?;
            match value {
                ValueRef::Blob(_) => debug!("Dropping blob value in '{}'.'{}'", table, name),
                // JSON has no infinity or NaN; these serialize as null.
                ValueRef::Real(f) if !f.is_finite() => {
                    debug!("Non-finite value {} in '{}'.'{}' will serialize as null", f, table, name)
                }
                _ => {}
            }
            row.insert(name.as_str(), Value::from_sql(value));
        }
        out.push(row);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE Parts (Id INTEGER, Name TEXT, Stream BLOB, Width REAL, Notes TEXT);
             INSERT INTO Parts VALUES (1, 'Leg', x'00FF10', 42.5, NULL);
             INSERT INTO Parts VALUES (2, 'Top', x'DEADBEEF', 800.0, 'oak');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_projection_query_never_star() {
        let sql = projection_query("Parts", &["Id".to_string(), "Name".to_string()]);
        assert_eq!(sql, r#"SELECT "Id", "Name" FROM "Parts""#);
        assert!(!sql.contains('*'));
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("Order Items"), "\"Order Items\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_extract_drops_blob_columns() {
        let conn = parts_db();
        let extract = extract_table(&conn, "Parts");

        assert!(extract.warning.is_none());
        assert_eq!(extract.rows.len(), 2);

        let first = &extract.rows[0];
        assert_eq!(first.columns().collect::<Vec<_>>(), vec!["Id", "Name", "Width", "Notes"]);
        assert_eq!(first.get("Id"), Some(&Value::Integer(1)));
        assert_eq!(first.get("Name"), Some(&Value::Text("Leg".into())));
        assert_eq!(first.get("Width"), Some(&Value::Real(42.5)));
        assert_eq!(first.get("Notes"), Some(&Value::Null));
        assert!(!first.contains("Stream"));
    }

    #[test]
    fn test_extract_missing_table() {
        let conn = parts_db();
        let extract = extract_table(&conn, "Hardware");

        assert!(extract.rows.is_empty());
        assert!(extract.warning.unwrap().is_recoverable());
    }

    #[test]
    fn test_extract_only_binary_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE PlacedSheets (Image BLOB, Data BLOB);
             INSERT INTO PlacedSheets VALUES (x'00', x'01');",
        )
        .unwrap();

        let extract = extract_table(&conn, "PlacedSheets");
        assert!(extract.rows.is_empty());
        assert!(extract.warning.is_some());
    }

    #[test]
    fn test_blob_in_text_column_becomes_null() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE Products (Id INTEGER, Name TEXT);
             INSERT INTO Products VALUES (1, x'CAFE');",
        )
        .unwrap();

        let extract = extract_table(&conn, "Products");
        assert_eq!(extract.rows[0].get("Name"), Some(&Value::Null));
    }

    #[test]
    fn test_infinite_real_serializes_as_null() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE OptimizationResults (Id INTEGER, Yield REAL);
             INSERT INTO OptimizationResults VALUES (1, 9e999);",
        )
        .unwrap();

        let extract = extract_table(&conn, "OptimizationResults");
        assert_eq!(extract.rows[0].get("Yield"), Some(&Value::Real(f64::INFINITY)));

        let json = serde_json::to_string(&extract.rows[0]).unwrap();
        assert_eq!(json, r#"{"Id":1,"Yield":null}"#);
    }

    #[test]
    fn test_row_serializes_in_column_order() {
        let row: Row = [("Zeta", Value::Integer(1)), ("Alpha", Value::from("a")), ("Mid", Value::Null)]
            .into_iter()
            .collect();

        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"Zeta":1,"Alpha":"a","Mid":null}"#);
    }

    #[test]
    fn test_row_insert_replaces() {
        let mut row = Row::new();
        row.insert("Id", 1i64);
        row.insert("Id", 2i64);
        assert_eq!(row.len(), 1);
        assert_eq!(row.get("Id"), Some(&Value::Integer(2)));
    }
}
