//! Catalog - validated, read-only view of the declared schema.

use super::{
    CloudStore, ColumnDef, ColumnType, DataSource, ForeignKeyData, RelationDef,
    SchemaDocument, TableDef,
};
use crate::error::Error;
use std::collections::HashMap;

/// Column on audit tables holding the snapshotted row's reference id.
pub const AUDIT_OBJECT_COLUMN: &str = "audit_object_id";

/// Validated schema: tables with their visible relations, and cloud stores.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: Vec<TableDef>,
    index: HashMap<String, usize>,
    relations: Vec<RelationDef>,
    cloud_stores: HashMap<String, CloudStore>,
}

impl Catalog {
    /// Build a catalog from a schema document.
    ///
    /// Fills relation defaults, prepends system columns, synthesizes join and
    /// audit tables, and attaches every relation to both of its ends.
    pub fn new(document: SchemaDocument) -> Result<Self, Error> {
        let SchemaDocument {
            tables,
            mut relations,
            cloud_stores,
        } = document;

        let mut catalog = Catalog::default();

        for store in cloud_stores {
            if catalog.cloud_stores.contains_key(&store.name) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate cloud store: {}",
                    store.name
                )));
            }
            catalog.cloud_stores.insert(store.name.clone(), store);
        }

        for table in tables {
            catalog.insert_table(table)?;
        }

        for relation in &mut relations {
            relation.fill_defaults();
            catalog.register_relation(relation)?;
        }

        for table in &mut catalog.tables {
            table.normalize_system_columns();
        }

        catalog.validate_columns()?;
        catalog.synthesize_audit_tables()?;

        for relation in &relations {
            catalog.attach(relation.clone());
        }
        catalog.relations = relations;

        tracing::debug!(
            tables = catalog.tables.len(),
            relations = catalog.relations.len(),
            "catalog built"
        );

        Ok(catalog)
    }

    /// Look up a table by name.
    pub fn table(&self, name: &str) -> Result<&TableDef, Error> {
        self.get_table(name)
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    /// Look up a table by name, if present.
    pub fn get_table(&self, name: &str) -> Option<&TableDef> {
        self.index.get(name).map(|&i| &self.tables[i])
    }

    /// All tables in declaration order (synthesized tables last).
    pub fn tables(&self) -> impl Iterator<Item = &TableDef> {
        self.tables.iter()
    }

    /// All relations in declaration order.
    pub fn relations(&self) -> &[RelationDef] {
        &self.relations
    }

    /// Look up a cloud store by name.
    pub fn cloud_store(&self, name: &str) -> Option<&CloudStore> {
        self.cloud_stores.get(name)
    }

    fn insert_table(&mut self, table: TableDef) -> Result<(), Error> {
        validate_identifier(&table.name)?;
        for column in &table.columns {
            validate_identifier(&column.name)?;
        }
        if self.index.contains_key(&table.name) {
            return Err(Error::InvalidSchema(format!(
                "duplicate table: {}",
                table.name
            )));
        }
        self.index.insert(table.name.clone(), self.tables.len());
        self.tables.push(table);
        Ok(())
    }

    fn table_mut(&mut self, name: &str) -> Option<&mut TableDef> {
        let i = *self.index.get(name)?;
        Some(&mut self.tables[i])
    }

    /// Check both ends and make sure the storing columns exist.
    fn register_relation(&mut self, relation: &RelationDef) -> Result<(), Error> {
        validate_identifier(&relation.subject_name)?;
        validate_identifier(&relation.object_name)?;
        for end in [&relation.subject, &relation.object] {
            if !self.index.contains_key(end.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "relation {} names unknown table {}",
                    relation, end
                )));
            }
        }

        let object_key = ColumnDef::new(&relation.object_name, ColumnType::Integer)
            .with_foreign_key(ForeignKeyData::table(&relation.object, "id"));

        match &relation.join_table {
            None => {
                if let Some(subject) = self.table_mut(&relation.subject) {
                    subject.ensure_column(object_key);
                }
            }
            Some(join_table) => {
                validate_identifier(join_table)?;
                if relation.subject_name == relation.object_name {
                    return Err(Error::InvalidSchema(format!(
                        "relation {} uses {} for both ends of {}",
                        relation, relation.subject_name, join_table
                    )));
                }
                if self.get_table(join_table).is_none() {
                    self.insert_table(TableDef::new(join_table.clone()))?;
                }
                let subject_key = ColumnDef::required(&relation.subject_name, ColumnType::Integer)
                    .with_foreign_key(ForeignKeyData::table(&relation.subject, "id"));
                if let Some(join) = self.table_mut(join_table) {
                    join.ensure_column(subject_key);
                    join.ensure_column(ColumnDef {
                        nullable: false,
                        ..object_key
                    });
                }
            }
        }

        Ok(())
    }

    fn validate_columns(&self) -> Result<(), Error> {
        for table in &self.tables {
            for column in &table.columns {
                let cloud_key = column.cloud_store_key();
                match (column.column_type, cloud_key) {
                    (ColumnType::Files, None) => {
                        return Err(Error::InvalidSchema(format!(
                            "files column {}.{} needs a cloud_store foreign key",
                            table.name, column.name
                        )));
                    }
                    (ColumnType::Files, Some(fk)) => {
                        if !self.cloud_stores.contains_key(&fk.namespace) {
                            return Err(Error::InvalidSchema(format!(
                                "column {}.{} names unknown cloud store {}",
                                table.name, column.name, fk.namespace
                            )));
                        }
                    }
                    (other, Some(_)) => {
                        return Err(Error::InvalidSchema(format!(
                            "cloud store column {}.{} must be of type files, not {:?}",
                            table.name, column.name, other
                        )));
                    }
                    (_, None) => {}
                }
                if let Some(fk) = &column.foreign_key {
                    if fk.data_source == DataSource::Table
                        && !self.index.contains_key(fk.namespace.as_str())
                    {
                        return Err(Error::InvalidSchema(format!(
                            "column {}.{} references unknown table {}",
                            table.name, column.name, fk.namespace
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn synthesize_audit_tables(&mut self) -> Result<(), Error> {
        let audited: Vec<TableDef> = self
            .tables
            .iter()
            .filter(|t| t.should_audit())
            .cloned()
            .collect();

        for table in audited {
            let audit_name = table.audit_table_name();
            if self.get_table(&audit_name).is_none() {
                self.insert_table(TableDef::new(audit_name.clone()))?;
            }
            let Some(audit) = self.table_mut(&audit_name) else {
                continue;
            };
            // Snapshots keep blob lists as plain JSON so audit rows never own files.
            for column in table.data_columns() {
                let column_type = match column.column_type {
                    ColumnType::Files => ColumnType::Text,
                    other => other,
                };
                audit.ensure_column(ColumnDef::new(&column.name, column_type));
            }
            audit.ensure_column(ColumnDef::new(AUDIT_OBJECT_COLUMN, ColumnType::Text));
            audit.audit_enabled = false;
            audit.translations_enabled = false;
            audit.normalize_system_columns();
        }
        Ok(())
    }

    fn attach(&mut self, relation: RelationDef) {
        if relation.subject != relation.object {
            if let Some(object) = self.table_mut(&relation.object) {
                object.relations.push(relation.clone());
            }
        }
        if let Some(subject) = self.table_mut(&relation.subject) {
            subject.relations.push(relation);
        }
    }
}

/// Check that a name is safe to splice into SQL as a quoted identifier.
pub fn validate_identifier(name: &str) -> Result<(), Error> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}
