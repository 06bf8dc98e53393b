//! Schema catalog for tabledb.
//!
//! The catalog stores metadata about tables, columns, relations and the cloud
//! stores blob columns point into.

mod catalog;
mod column;
mod document;
mod relation;
mod table;

pub use catalog::{validate_identifier, Catalog, AUDIT_OBJECT_COLUMN};
pub use column::{ColumnDef, ColumnType, DataSource, ForeignKeyData};
pub use document::{CloudStore, SchemaDocument};
pub use relation::{RelationDef, RelationKind, Role};
pub use table::{
    is_system_column, TableDef, ID_COLUMN, OWNER_COLUMN, PERMISSION_COLUMN, REFERENCE_ID_COLUMN,
    SYSTEM_COLUMNS,
};

/// Suffix of audit shadow tables.
pub const AUDIT_SUFFIX: &str = "_audit";

/// Suffix of translation tables.
pub const I18N_SUFFIX: &str = "_i18n";

/// Check whether a table name denotes an audit table.
pub fn is_audit_table(name: &str) -> bool {
    name.ends_with(AUDIT_SUFFIX)
}
