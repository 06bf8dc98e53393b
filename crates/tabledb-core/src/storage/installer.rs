//! DDL for a fresh SQLite database.

use rusqlite::Connection;
use tracing::info;

use super::{quote_ident, GROUP_PERMISSION_TABLE};
use crate::catalog::{
    Catalog, ColumnDef, DataSource, TableDef, ID_COLUMN, PERMISSION_COLUMN, REFERENCE_ID_COLUMN,
};
use crate::error::Error;

/// Creates every table the catalog needs.
pub struct SchemaInstaller<'a> {
    catalog: &'a Catalog,
}

impl<'a> SchemaInstaller<'a> {
    /// Create an installer for a catalog.
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// The statements `install` runs, in order.
    pub fn ddl(&self) -> Vec<String> {
        let mut statements = Vec::new();

        for table in self.catalog.tables() {
            statements.push(create_table(&table.name, table.columns().iter(), &[]));
            statements.extend(foreign_key_indexes(table));

            if table.translations_enabled {
                let i18n = table.i18n_table_name();
                statements.push(create_table(
                    &i18n,
                    table.columns().iter(),
                    &[
                        "\"translation_reference_id\" INTEGER NOT NULL",
                        "\"language_id\" TEXT NOT NULL",
                    ],
                ));
                statements.push(format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {} (\"translation_reference_id\", \"language_id\")",
                    quote_ident(&format!("idx_{}_translation", i18n)),
                    quote_ident(&i18n)
                ));
            }
        }

        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {} (\
             \"table_name\" TEXT NOT NULL, \
             \"object_id\" INTEGER NOT NULL, \
             \"group_reference_id\" TEXT NOT NULL, \
             \"permission\" INTEGER NOT NULL DEFAULT 0)",
            quote_ident(GROUP_PERMISSION_TABLE)
        ));
        statements.push(format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} (\"table_name\", \"object_id\")",
            quote_ident(&format!("idx_{}_object", GROUP_PERMISSION_TABLE)),
            quote_ident(GROUP_PERMISSION_TABLE)
        ));

        statements
    }

    /// Run the DDL against a connection.
    pub fn install(&self, conn: &Connection) -> Result<(), Error> {
        let statements = self.ddl();
        for sql in &statements {
            conn.execute(sql, [])?;
        }
        info!(statements = statements.len(), "schema installed");
        Ok(())
    }
}

fn create_table<'c>(
    name: &str,
    columns: impl Iterator<Item = &'c ColumnDef>,
    extra: &[&str],
) -> String {
    let mut definitions: Vec<String> = columns.map(column_definition).collect();
    definitions.extend(extra.iter().map(|s| s.to_string()));
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(name),
        definitions.join(", ")
    )
}

fn column_definition(column: &ColumnDef) -> String {
    let name = quote_ident(&column.name);
    match column.name.as_str() {
        ID_COLUMN => format!("{} INTEGER PRIMARY KEY", name),
        REFERENCE_ID_COLUMN => format!("{} TEXT NOT NULL UNIQUE", name),
        PERMISSION_COLUMN => format!("{} INTEGER NOT NULL DEFAULT 0", name),
        _ if column.nullable => format!("{} {}", name, column.column_type.sql_type()),
        _ => format!("{} {} NOT NULL", name, column.column_type.sql_type()),
    }
}

fn foreign_key_indexes(table: &TableDef) -> impl Iterator<Item = String> + '_ {
    table
        .columns()
        .iter()
        .filter(|c| {
            c.foreign_key
                .as_ref()
                .is_some_and(|fk| fk.data_source == DataSource::Table)
        })
        .map(move |c| {
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                quote_ident(&format!("idx_{}_{}", table.name, c.name)),
                quote_ident(&table.name),
                quote_ident(&c.name)
            )
        })
}
