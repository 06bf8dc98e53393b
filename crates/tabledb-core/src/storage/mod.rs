//! SQLite storage layer.
//!
//! Every statement is parameterized. Table and column names are spliced in
//! only after catalog validation, and always quoted.

mod installer;
mod store;

pub use installer::SchemaInstaller;
pub use store::{JoinRow, RowStore, GROUP_PERMISSION_TABLE};

/// Quote an SQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
