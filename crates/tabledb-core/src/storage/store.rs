//! Row store - the parameterized statements the delete engine issues.

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, ToSql};
use tracing::debug;

use super::quote_ident;
use crate::catalog::{
    Catalog, RelationDef, TableDef, ID_COLUMN, OWNER_COLUMN, PERMISSION_COLUMN,
    REFERENCE_ID_COLUMN,
};
use crate::error::Error;
use crate::row::{field, Fields, Row, Value};
use crate::security::{GroupPermission, ObjectPermission, PermissionBits};

/// Shared table holding per-group grants on objects.
pub const GROUP_PERMISSION_TABLE: &str = "object_group_permission";

/// One association row of a join table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRow {
    /// Reference id of the join row itself.
    pub reference_id: String,
    /// Internal id of the associated object.
    pub object_id: i64,
    /// Reference id of the associated object, if it still exists.
    pub object_reference_id: Option<String>,
}

/// Statement layer over a connection or an open transaction.
///
/// Statements are cached per connection and finalized back into the cache
/// when they go out of scope, on every return path.
pub struct RowStore<'a> {
    conn: &'a Connection,
    catalog: &'a Catalog,
}

impl<'a> RowStore<'a> {
    /// Create a store over a connection (a `Transaction` derefs to one).
    pub fn new(conn: &'a Connection, catalog: &'a Catalog) -> Self {
        Self { conn, catalog }
    }

    /// The catalog statements are validated against.
    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    /// Load a full row by reference id.
    pub fn get_row_by_reference_id(&self, table: &str, reference_id: &str) -> Result<Row, Error> {
        let def = self.catalog.table(table)?;
        let columns: Vec<String> = def.columns().iter().map(|c| quote_ident(&c.name)).collect();
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            columns.join(", "),
            quote_ident(&def.name),
            quote_ident(REFERENCE_ID_COLUMN)
        );

        let raw: Option<Vec<SqlValue>> = {
            let mut stmt = self.conn.prepare_cached(&sql)?;
            stmt.query_row([reference_id], |row| {
                (0..columns.len())
                    .map(|i| row.get::<_, SqlValue>(i))
                    .collect::<Result<Vec<_>, _>>()
            })
            .optional()?
        };

        let raw = raw.ok_or_else(|| Error::NotFound {
            table: def.name.clone(),
            reference_id: reference_id.to_string(),
        })?;

        let mut values = Vec::with_capacity(raw.len());
        for (column, value) in def.columns().iter().zip(raw) {
            values.push((column.name.clone(), Value::decode(column.column_type, value)?));
        }

        let id = field(&values, ID_COLUMN)
            .and_then(Value::as_integer)
            .ok_or_else(|| {
                Error::InvalidData(format!("row [{}][{}] has no id", def.name, reference_id))
            })?;

        Ok(Row {
            table: def.name.clone(),
            id,
            reference_id: reference_id.to_string(),
            values,
        })
    }

    /// Reference ids of rows whose `column` equals `id`, in storage order.
    pub fn reference_ids_where(&self, table: &str, column: &str, id: i64) -> Result<Vec<String>, Error> {
        let def = self.catalog.table(table)?;
        require_column(def, column)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1 ORDER BY {}",
            quote_ident(REFERENCE_ID_COLUMN),
            quote_ident(&def.name),
            quote_ident(column),
            quote_ident(ID_COLUMN)
        );

        let mut stmt = self.conn.prepare_cached(&sql)?;
        let ids = stmt
            .query_map([id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Join rows associating the given subject row with objects.
    pub fn join_rows_of_subject(
        &self,
        relation: &RelationDef,
        subject_id: i64,
    ) -> Result<Vec<JoinRow>, Error> {
        let join = self.catalog.table(relation.join_table_name())?;
        let object = self.catalog.table(&relation.object)?;
        require_column(join, &relation.subject_name)?;
        require_column(join, &relation.object_name)?;

        let sql = format!(
            "SELECT j.{reference}, j.{object_col}, o.{reference} \
             FROM {join} AS j LEFT JOIN {object} AS o ON o.{id} = j.{object_col} \
             WHERE j.{subject_col} = ?1 ORDER BY j.{id}",
            reference = quote_ident(REFERENCE_ID_COLUMN),
            object_col = quote_ident(&relation.object_name),
            subject_col = quote_ident(&relation.subject_name),
            join = quote_ident(&join.name),
            object = quote_ident(&object.name),
            id = quote_ident(ID_COLUMN),
        );

        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt
            .query_map([subject_id], |row| {
                Ok(JoinRow {
                    reference_id: row.get(0)?,
                    object_id: row.get(1)?,
                    object_reference_id: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Reference ids of join rows pointing at the given object row.
    pub fn join_rows_of_object(&self, relation: &RelationDef, object_id: i64) -> Result<Vec<String>, Error> {
        self.reference_ids_where(relation.join_table_name(), &relation.object_name, object_id)
    }

    /// Reference ids of subject rows whose foreign key points at the object row.
    pub fn subjects_referencing(&self, relation: &RelationDef, object_id: i64) -> Result<Vec<String>, Error> {
        self.reference_ids_where(&relation.subject, &relation.object_name, object_id)
    }

    /// Delete a base row. Returns the number of rows removed.
    pub fn delete_by_reference_id(&self, table: &str, reference_id: &str) -> Result<usize, Error> {
        let def = self.catalog.table(table)?;
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            quote_ident(&def.name),
            quote_ident(REFERENCE_ID_COLUMN)
        );
        debug!(sql = %sql, reference_id, "delete");

        let mut stmt = self.conn.prepare_cached(&sql)?;
        Ok(stmt.execute([reference_id])?)
    }

    /// Delete the localized variant of a row for one language.
    pub fn delete_translation(
        &self,
        table: &TableDef,
        translation_reference_id: i64,
        language: &str,
    ) -> Result<usize, Error> {
        let sql = format!(
            "DELETE FROM {} WHERE translation_reference_id = ?1 AND language_id = ?2",
            quote_ident(&table.i18n_table_name())
        );
        debug!(sql = %sql, translation_reference_id, language, "delete translation");

        let mut stmt = self.conn.prepare_cached(&sql)?;
        Ok(stmt.execute(params![translation_reference_id, language])?)
    }

    /// Insert a row from named values. Returns the new internal id.
    pub fn insert(&self, table: &str, fields: &Fields) -> Result<i64, Error> {
        let def = self.catalog.table(table)?;
        let fields: Vec<&(String, Value)> =
            fields.iter().filter(|(name, _)| name != ID_COLUMN).collect();
        for (name, _) in &fields {
            require_column(def, name)?;
        }

        let sql = if fields.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote_ident(&def.name))
        } else {
            let columns: Vec<String> = fields.iter().map(|(name, _)| quote_ident(name)).collect();
            let placeholders: Vec<String> = (1..=fields.len()).map(|i| format!("?{}", i)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(&def.name),
                columns.join(", "),
                placeholders.join(", ")
            )
        };

        let mut stmt = self.conn.prepare_cached(&sql)?;
        stmt.execute(params_from_iter(fields.iter().map(|(_, value)| value)))?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Resolve an object's permissions by internal id.
    pub fn permission_by_id(&self, table: &str, id: i64) -> Result<ObjectPermission, Error> {
        self.load_permission(table, ID_COLUMN, &id)
    }

    /// Resolve an object's permissions by reference id.
    pub fn permission_by_reference_id(
        &self,
        table: &str,
        reference_id: &str,
    ) -> Result<ObjectPermission, Error> {
        self.load_permission(table, REFERENCE_ID_COLUMN, &reference_id)
    }

    /// Grant a group capabilities on an object.
    pub fn grant_group(
        &self,
        table: &str,
        object_id: i64,
        group_reference_id: &str,
        permission: PermissionBits,
    ) -> Result<(), Error> {
        let def = self.catalog.table(table)?;
        let sql = format!(
            "INSERT INTO {} (table_name, object_id, group_reference_id, permission) \
             VALUES (?1, ?2, ?3, ?4)",
            quote_ident(GROUP_PERMISSION_TABLE)
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        stmt.execute(params![def.name, object_id, group_reference_id, permission.0])?;
        Ok(())
    }

    /// Missing objects resolve to an empty descriptor, which denies everything.
    fn load_permission(
        &self,
        table: &str,
        key_column: &str,
        key: &dyn ToSql,
    ) -> Result<ObjectPermission, Error> {
        let def = self.catalog.table(table)?;
        let sql = format!(
            "SELECT {}, {}, {} FROM {} WHERE {} = ?1",
            quote_ident(ID_COLUMN),
            quote_ident(PERMISSION_COLUMN),
            quote_ident(OWNER_COLUMN),
            quote_ident(&def.name),
            quote_ident(key_column)
        );

        let found: Option<(i64, i64, Option<String>)> = {
            let mut stmt = self.conn.prepare_cached(&sql)?;
            stmt.query_row([key], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
                .optional()?
        };

        let Some((id, permission, owner_reference_id)) = found else {
            return Ok(ObjectPermission::empty());
        };

        let sql = format!(
            "SELECT group_reference_id, permission FROM {} \
             WHERE table_name = ?1 AND object_id = ?2 ORDER BY rowid",
            quote_ident(GROUP_PERMISSION_TABLE)
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let groups = stmt
            .query_map(params![def.name, id], |row| {
                Ok(GroupPermission {
                    group_reference_id: row.get(0)?,
                    permission: PermissionBits(row.get(1)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ObjectPermission {
            owner_reference_id,
            permission: PermissionBits(permission),
            groups,
        })
    }
}

fn require_column(table: &TableDef, column: &str) -> Result<(), Error> {
    if table.column(column).is_some() {
        Ok(())
    } else {
        Err(Error::UnknownColumn {
            table: table.name.clone(),
            column: column.to_string(),
        })
    }
}
