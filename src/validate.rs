//! JSON document structure checks
//!
//! The document contract: a single object with exactly the six table keys,
//! each an array of flat objects whose values are scalars. `--self-check`
//! runs the same verification over documents built in memory.

use crate::db::Value;
use crate::error::{DbError, ImportError, Result};
use crate::export::render_document;
use crate::import::{extract_all, ImportResult, Table};
use rusqlite::Connection;
use tracing::info;

/// Check a rendered document, collecting every problem found
pub fn verify_document(json: &str) -> std::result::Result<(), Vec<String>> {
    let document: serde_json::Value = match serde_json::from_str(json) {
        Ok(value) => value,
        Err(e) => return Err(vec![format!("not valid JSON: {}", e)]),
    };

    let Some(object) = document.as_object() else {
        return Err(vec!["document is not a JSON object".to_string()]);
    };

    let mut problems = Vec::new();

    for table in Table::ALL {
        let key = table.json_key();
        match object.get(key) {
            None => problems.push(format!("missing key '{}'", key)),
            Some(serde_json::Value::Array(rows)) => {
                for (idx, row) in rows.iter().enumerate() {
                    check_row(key, idx, row, &mut problems);
                }
            }
            Some(_) => problems.push(format!("'{}' is not an array", key)),
        }
    }

    for key in object.keys() {
        if !Table::ALL.iter().any(|t| t.json_key() == key) {
            problems.push(format!("unexpected key '{}'", key));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems)
    }
}

fn check_row(key: &str, idx: usize, row: &serde_json::Value, problems: &mut Vec<String>) {
    let Some(fields) = row.as_object() else {
        problems.push(format!("{}[{}] is not an object", key, idx));
        return;
    };

    for (column, value) in fields {
        if value.is_array() || value.is_object() {
            problems.push(format!("{}[{}].{} is not a scalar value", key, idx, column));
        }
    }
}

/// Verify a document, mapping problems to `OutputStructureInvalid`
pub fn ensure_valid(json: &str) -> Result<()> {
    verify_document(json).map_err(|problems| ImportError::OutputStructureInvalid(problems.join("; ")))
}

/// Render and verify an empty result and a sample extraction
pub fn run_self_check() -> Result<()> {
    let empty = render_document(&ImportResult::default())?;
    ensure_valid(&empty)?;
    info!("Self-check: empty document OK");

    let conn = Connection::open_in_memory().map_err(DbError::from)?;
    conn.execute_batch(
        "CREATE TABLE Products (Id INTEGER, Name TEXT, Price REAL, Note TEXT);
         INSERT INTO Products VALUES (1, 'Wall Cabinet', 129.5, NULL);
         CREATE TABLE Parts (Id INTEGER, Name TEXT, Stream BLOB);
         INSERT INTO Parts VALUES (1, 'Leg', x'00FF'), (2, 'Top', x'FF00');",
    )
    .map_err(DbError::from)?;

    let (result, _) = extract_all(&conn, None);
    let sample = render_document(&result)?;
    ensure_valid(&sample)?;

    let leaked = result.parts.iter().any(|row| row.contains("Stream"));
    let expected = result.parts.len() == 2 && result.products.first().and_then(|row| row.get("Note")) == Some(&Value::Null);
    if leaked || !expected {
        return Err(ImportError::OutputStructureInvalid(
            "sample extraction did not match expected rows".to_string(),
        ));
    }
    info!("Self-check: sample document OK");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_document() {
        let doc = r#"{
            "products": [{"Id": 1, "Name": "Base", "Active": true, "Note": null}],
            "parts": [], "placedSheets": [], "hardware": [],
            "subassemblies": [], "optimizationResults": []
        }"#;
        assert!(verify_document(doc).is_ok());
    }

    #[test]
    fn test_missing_and_wrong_type() {
        let doc = r#"{"products": {}, "parts": [], "placedSheets": [], "hardware": null, "subassemblies": []}"#;
        let problems = verify_document(doc).unwrap_err();

        assert!(problems.contains(&"'products' is not an array".to_string()));
        assert!(problems.contains(&"'hardware' is not an array".to_string()));
        assert!(problems.contains(&"missing key 'optimizationResults'".to_string()));
    }

    #[test]
    fn test_nested_values_rejected() {
        let doc = r#"{
            "products": [{"Id": [1, 2]}, 5],
            "parts": [], "placedSheets": [], "hardware": [],
            "subassemblies": [], "optimizationResults": []
        }"#;
        let problems = verify_document(doc).unwrap_err();
        assert_eq!(problems.len(), 2);
    }

    #[test]
    fn test_not_json() {
        assert!(verify_document("not json").is_err());
        assert!(verify_document("[]").is_err());
    }

    #[test]
    fn test_unexpected_key() {
        let doc = r#"{
            "products": [], "parts": [], "placedSheets": [], "hardware": [],
            "subassemblies": [], "optimizationResults": [], "Products": []
        }"#;
        let problems = verify_document(doc).unwrap_err();
        assert_eq!(problems, vec!["unexpected key 'Products'".to_string()]);
    }

    #[test]
    fn test_ensure_valid_error_kind() {
        let err = ensure_valid("{}").unwrap_err();
        assert!(matches!(err, ImportError::OutputStructureInvalid(_)));
    }

    #[test]
    fn test_self_check_passes() {
        run_self_check().unwrap();
    }
}
