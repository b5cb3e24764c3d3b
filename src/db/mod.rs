//! SQLite store access
//!
//! Everything that touches a SQLite connection lives here. The import
//! only ever reads; the store schema is never altered.
//!
//! ```text
//! ┌──────────────┐   pragma_table_info   ┌──────────────┐
//! │   schema     │ ────────────────────▶ │ allowed cols │
//! └──────────────┘                       └──────┬───────┘
//!                                               │ SELECT "a", "b" ...
//!                                               ▼
//! ┌──────────────┐                       ┌──────────────┐
//! │    store     │ ◀──── connection ──── │   extract    │ ──▶ Vec<Row>
//! └──────────────┘                       └──────────────┘
//! ```

pub mod extract;
pub mod schema;
pub mod store;

pub use extract::{extract_table, projection_query, quote_identifier, Row, TableExtract, Value};
pub use schema::{
    allowed_columns, introspect_columns, is_binary_column, partition_columns, ColumnDescriptor,
    ColumnSelection, BINARY_TYPE_KEYWORDS, BLOB_NAME_DENYLIST,
};
pub use store::{copy_store, count_rows, is_same_file, open_readonly, StoreHandle};
