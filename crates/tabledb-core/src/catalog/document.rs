//! Schema document - the declared shape the catalog is built from.

use super::{RelationDef, TableDef};
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A named external blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudStore {
    /// Store name referenced by column foreign keys.
    pub name: String,
    /// Provider label (e.g. "local", "s3").
    pub store_provider: String,
    /// Root location: a URL or a local directory.
    pub root_path: String,
    /// Credential handle for the provider, if any.
    #[serde(default)]
    pub oauth_token_id: Option<String>,
}

impl CloudStore {
    /// Create a cloud store definition.
    pub fn new(
        name: impl Into<String>,
        store_provider: impl Into<String>,
        root_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            store_provider: store_provider.into(),
            root_path: root_path.into(),
            oauth_token_id: None,
        }
    }

    /// Set the credential handle.
    pub fn with_oauth_token(mut self, token_id: impl Into<String>) -> Self {
        self.oauth_token_id = Some(token_id.into());
        self
    }
}

/// Declared tables, relations and cloud stores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDocument {
    /// Table definitions in declaration order.
    #[serde(default)]
    pub tables: Vec<TableDef>,
    /// Relation definitions in declaration order.
    #[serde(default)]
    pub relations: Vec<RelationDef>,
    /// Cloud store definitions.
    #[serde(default)]
    pub cloud_stores: Vec<CloudStore>,
}

impl SchemaDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table.
    pub fn with_table(mut self, table: TableDef) -> Self {
        self.tables.push(table);
        self
    }

    /// Add a relation.
    pub fn with_relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }

    /// Add a cloud store.
    pub fn with_cloud_store(mut self, store: CloudStore) -> Self {
        self.cloud_stores.push(store);
        self
    }

    /// Parse a document from JSON text.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a document from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidSchema(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RelationKind;

    #[test]
    fn test_from_json() {
        let doc = SchemaDocument::from_json(
            r#"{
                "tables": [
                    {"name": "invoice", "audit_enabled": true,
                     "columns": [{"name": "number", "type": "text", "nullable": false}]},
                    {"name": "invoice_line"}
                ],
                "relations": [
                    {"subject": "invoice", "object": "invoice_line", "relation": "has_many"}
                ],
                "cloud_stores": [
                    {"name": "assets", "store_provider": "local", "root_path": "/srv/assets"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(doc.tables.len(), 2);
        assert!(doc.tables[0].audit_enabled);
        assert_eq!(doc.relations[0].kind, RelationKind::HasMany);
        assert_eq!(doc.cloud_stores[0].name, "assets");
        assert!(doc.cloud_stores[0].oauth_token_id.is_none());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            SchemaDocument::from_json("{\"tables\": 3}"),
            Err(Error::Serialization(_))
        ));
    }
}
