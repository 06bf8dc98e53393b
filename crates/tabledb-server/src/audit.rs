//! Audit snapshots written before a row is deleted.

use rusqlite::Connection;
use tabledb_core::catalog::{AUDIT_OBJECT_COLUMN, OWNER_COLUMN, PERMISSION_COLUMN};
use tabledb_core::{Fields, Row, TableDef};
use tracing::{error, info};

use crate::cascade::{CascadeReport, CascadeWarning};
use crate::registry::ResourceRegistry;
use crate::request::{Method, Request};

/// Savepoint wrapping one audit create.
const SAVEPOINT: &str = "audit_snapshot";

/// Writes `<table>_audit` rows through the registry's create path.
pub struct AuditRecorder<'a> {
    registry: &'a ResourceRegistry,
}

impl<'a> AuditRecorder<'a> {
    /// Create a recorder resolving creators from a registry.
    pub fn new(registry: &'a ResourceRegistry) -> Self {
        Self { registry }
    }

    /// Build the audit record of a row: its data columns, permission and
    /// owner, plus the reference id of the row itself.
    pub fn audit_record(table: &TableDef, row: &Row) -> Fields {
        let mut record: Fields = table
            .data_columns()
            .filter_map(|column| {
                row.get(&column.name)
                    .map(|value| (column.name.clone(), value.clone()))
            })
            .collect();

        for column in [PERMISSION_COLUMN, OWNER_COLUMN] {
            if let Some(value) = row.get(column) {
                record.push((column.to_string(), value.clone()));
            }
        }
        record.push((AUDIT_OBJECT_COLUMN.to_string(), row.reference_id.clone().into()));
        record
    }

    /// Snapshot the row into its audit table. Never fails the delete.
    pub fn record_before_delete(
        &self,
        table: &TableDef,
        row: &Row,
        request: &Request,
        tx: &Connection,
        report: &mut CascadeReport,
    ) {
        let audit_table = table.audit_table_name();
        info!(table = %table.name, reference_id = %row.reference_id, audit_table = %audit_table, "auditing row before delete");

        let Some(creator) = self.registry.creator(&audit_table) else {
            error!(audit_table = %audit_table, "no creator for audit table");
            report.warn(CascadeWarning::AuditSkipped {
                table: table.name.clone(),
                audit_table,
            });
            return;
        };

        // A failed create must not leave a half-written snapshot in the
        // transaction that goes on to delete the row.
        if let Err(e) = tx.execute_batch(&format!("SAVEPOINT {}", SAVEPOINT)) {
            report.warn(CascadeWarning::AuditFailed {
                table: table.name.clone(),
                audit_table,
                message: e.to_string(),
            });
            return;
        }

        let create = request.derive(Method::Post);
        match creator.create_with_transaction(Self::audit_record(table, row), &create, tx) {
            Ok(audit_reference_id) => {
                if let Err(e) = tx.execute_batch(&format!("RELEASE {}", SAVEPOINT)) {
                    error!(audit_table = %audit_table, error = %e, "failed to release audit savepoint");
                }
                info!(audit_table = %audit_table, reference_id = %row.reference_id, audit_reference_id = %audit_reference_id, "created audit record");
            }
            Err(e) => {
                let undo = format!("ROLLBACK TO {0}; RELEASE {0}", SAVEPOINT);
                if let Err(rollback) = tx.execute_batch(&undo) {
                    error!(audit_table = %audit_table, error = %rollback, "failed to roll back audit savepoint");
                }
                report.warn(CascadeWarning::AuditFailed {
                    table: table.name.clone(),
                    audit_table,
                    message: e.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabledb_core::{ColumnDef, ColumnType, Value};

    #[test]
    fn test_audit_record_copies_data_and_ownership() {
        let table = TableDef::new("invoice")
            .with_column(ColumnDef::new("number", ColumnType::Text))
            .with_column(ColumnDef::new("total", ColumnType::Real));
        let row = Row {
            table: "invoice".into(),
            id: 4,
            reference_id: "inv-4".into(),
            values: vec![
                ("id".into(), Value::Integer(4)),
                ("reference_id".into(), Value::from("inv-4")),
                ("permission".into(), Value::Integer(128)),
                ("owner_reference_id".into(), Value::from("alice")),
                ("number".into(), Value::from("2024-004")),
                ("total".into(), Value::Real(9.5)),
            ],
        };

        let record = AuditRecorder::audit_record(&table, &row);

        assert_eq!(
            record,
            vec![
                ("number".to_string(), Value::from("2024-004")),
                ("total".to_string(), Value::Real(9.5)),
                ("permission".to_string(), Value::Integer(128)),
                ("owner_reference_id".to_string(), Value::from("alice")),
                ("audit_object_id".to_string(), Value::from("inv-4")),
            ]
        );
    }
}
