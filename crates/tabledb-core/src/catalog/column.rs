//! Column definitions for tables.

use serde::{Deserialize, Serialize};

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// 64-bit signed integer.
    Integer,
    /// 64-bit floating point.
    Real,
    /// UTF-8 text.
    Text,
    /// Boolean stored as 0/1.
    Boolean,
    /// Binary data.
    Bytes,
    /// JSON list of blob descriptors held in an external store.
    Files,
}

impl ColumnType {
    /// SQLite type affinity used in generated DDL.
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnType::Integer | ColumnType::Boolean => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text | ColumnType::Files => "TEXT",
            ColumnType::Bytes => "BLOB",
        }
    }
}

/// Where a foreign key points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Another table in the catalog.
    Table,
    /// A named external blob store.
    CloudStore,
}

/// Foreign key metadata of a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyData {
    /// Kind of target.
    pub data_source: DataSource,
    /// Target table or cloud store name.
    pub namespace: String,
    /// Key or folder name inside the target.
    pub key_name: String,
}

impl ForeignKeyData {
    /// Foreign key into a cloud store folder.
    pub fn cloud_store(namespace: impl Into<String>, key_name: impl Into<String>) -> Self {
        Self {
            data_source: DataSource::CloudStore,
            namespace: namespace.into(),
            key_name: key_name.into(),
        }
    }

    /// Foreign key into another table.
    pub fn table(namespace: impl Into<String>, key_name: impl Into<String>) -> Self {
        Self {
            data_source: DataSource::Table,
            namespace: namespace.into(),
            key_name: key_name.into(),
        }
    }
}

/// A column definition within a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Column storage type.
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Whether NULL is accepted.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Foreign key metadata, if any.
    #[serde(default)]
    pub foreign_key: Option<ForeignKeyData>,
}

fn default_nullable() -> bool {
    true
}

impl ColumnDef {
    /// Create a new nullable column.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            foreign_key: None,
        }
    }

    /// Create a NOT NULL column.
    pub fn required(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            nullable: false,
            ..Self::new(name, column_type)
        }
    }

    /// Create a blob column backed by a cloud store folder.
    pub fn files(
        name: impl Into<String>,
        store: impl Into<String>,
        key_name: impl Into<String>,
    ) -> Self {
        Self::new(name, ColumnType::Files).with_foreign_key(ForeignKeyData::cloud_store(store, key_name))
    }

    /// Attach foreign key metadata.
    pub fn with_foreign_key(mut self, foreign_key: ForeignKeyData) -> Self {
        self.foreign_key = Some(foreign_key);
        self
    }

    /// Check whether this column is a foreign key.
    pub fn is_foreign_key(&self) -> bool {
        self.foreign_key.is_some()
    }

    /// Foreign key data when the column references a cloud store.
    pub fn cloud_store_key(&self) -> Option<&ForeignKeyData> {
        self.foreign_key
            .as_ref()
            .filter(|fk| fk.data_source == DataSource::CloudStore)
    }
}
