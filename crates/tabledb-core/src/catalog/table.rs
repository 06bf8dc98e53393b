//! Table definitions.

use super::column::{ColumnDef, ColumnType};
use super::relation::RelationDef;
use serde::{Deserialize, Serialize};

/// Internal numeric primary key.
pub const ID_COLUMN: &str = "id";
/// Stable external identifier.
pub const REFERENCE_ID_COLUMN: &str = "reference_id";
/// Packed permission bits of the row.
pub const PERMISSION_COLUMN: &str = "permission";
/// Reference id of the owning user.
pub const OWNER_COLUMN: &str = "owner_reference_id";

/// Columns every table carries, in storage order.
pub const SYSTEM_COLUMNS: [&str; 4] = [
    ID_COLUMN,
    REFERENCE_ID_COLUMN,
    PERMISSION_COLUMN,
    OWNER_COLUMN,
];

/// Check whether a column is managed by the store rather than the schema.
pub fn is_system_column(name: &str) -> bool {
    SYSTEM_COLUMNS.contains(&name)
}

/// A table definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    /// Table name (unique within the catalog).
    pub name: String,
    /// Column definitions in declaration order.
    #[serde(default)]
    pub columns: Vec<ColumnDef>,
    /// Relations visible from this table, attached by the catalog.
    #[serde(skip)]
    pub relations: Vec<RelationDef>,
    /// Write a snapshot to `<name>_audit` before rows are deleted.
    #[serde(default)]
    pub audit_enabled: bool,
    /// Localized variants live in `<name>_i18n`.
    #[serde(default)]
    pub translations_enabled: bool,
}

impl TableDef {
    /// Create a new table definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            relations: Vec::new(),
            audit_enabled: false,
            translations_enabled: false,
        }
    }

    /// Add a column to the table.
    pub fn with_column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Add multiple columns.
    pub fn with_columns(mut self, columns: impl IntoIterator<Item = ColumnDef>) -> Self {
        self.columns.extend(columns);
        self
    }

    /// Enable auditing.
    pub fn with_audit(mut self) -> Self {
        self.audit_enabled = true;
        self
    }

    /// Enable translations.
    pub fn with_translations(mut self) -> Self {
        self.translations_enabled = true;
        self
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Relations visible from this table, in declaration order.
    pub fn relations(&self) -> &[RelationDef] {
        &self.relations
    }

    /// Columns that are not system columns.
    pub fn data_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| !is_system_column(&c.name))
    }

    /// Columns holding blob descriptors of a cloud store.
    pub fn cloud_store_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| c.cloud_store_key().is_some())
    }

    /// Name of the audit shadow table.
    pub fn audit_table_name(&self) -> String {
        format!("{}{}", self.name, super::AUDIT_SUFFIX)
    }

    /// Name of the translation table.
    pub fn i18n_table_name(&self) -> String {
        format!("{}{}", self.name, super::I18N_SUFFIX)
    }

    /// Check whether this is itself an audit table.
    pub fn is_audit_table(&self) -> bool {
        super::is_audit_table(&self.name)
    }

    /// Check whether deletes of this table should be audited.
    pub fn should_audit(&self) -> bool {
        self.audit_enabled && !self.is_audit_table()
    }

    /// Ensure the system columns lead the column list.
    pub(crate) fn normalize_system_columns(&mut self) {
        let mut system = vec![
            ColumnDef::required(ID_COLUMN, ColumnType::Integer),
            ColumnDef::required(REFERENCE_ID_COLUMN, ColumnType::Text),
            ColumnDef::required(PERMISSION_COLUMN, ColumnType::Integer),
            ColumnDef::new(OWNER_COLUMN, ColumnType::Text),
        ];
        self.columns.retain(|c| !is_system_column(&c.name));
        system.append(&mut self.columns);
        self.columns = system;
    }

    /// Add a column unless one with the same name already exists.
    pub(crate) fn ensure_column(&mut self, column: ColumnDef) {
        if self.column(&column.name).is_none() {
            self.columns.push(column);
        }
    }
}
