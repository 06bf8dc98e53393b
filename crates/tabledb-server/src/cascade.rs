//! Cascade executor for deletes.
//!
//! Deleting a row first takes care of everything that depends on it:
//! - an audit snapshot of the row, when its table is audited
//! - the blobs referenced by its files columns
//! - dependents reachable through its relations, children before parents
//!
//! Authorization of has-many dependents is all-or-nothing per relation. Any
//! error propagates and the caller rolls back the transaction; blob and audit
//! problems are collected as warnings instead.

use rusqlite::Connection;
use serde::Serialize;
use tabledb_core::{
    ObjectPermission, RelationDef, RelationKind, Role, Row, RowStore, TableDef,
};
use tracing::{debug, info, warn};

use crate::audit::AuditRecorder;
use crate::error::Error;
use crate::registry::ResourceRegistry;
use crate::request::{Method, Request};
use crate::resource::ResourceContext;

/// Default bound on nested deletes.
pub const MAX_CASCADE_DEPTH: usize = 100;

/// A row removed by a cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletedRow {
    /// Table of the row.
    pub table: String,
    /// Reference id of the row.
    pub reference_id: String,
    /// Set when only the translation for this language was removed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// A problem that did not stop the delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CascadeWarning {
    /// The blob store could not delete a file.
    BlobCleanup {
        /// Table of the row.
        table: String,
        /// Files column.
        column: String,
        /// File location inside the column's folder.
        path: String,
        /// Store error.
        message: String,
    },
    /// The local cache mirror could not delete a file.
    CacheMirror {
        /// Table of the row.
        table: String,
        /// Files column.
        column: String,
        /// File location inside the mirror.
        path: String,
        /// IO error.
        message: String,
    },
    /// A files column names a cloud store that is not declared.
    MissingCloudStore {
        /// Table of the row.
        table: String,
        /// Files column.
        column: String,
        /// Store name.
        store: String,
    },
    /// A files column held something other than a blob list.
    UnknownBlobContent {
        /// Table of the row.
        table: String,
        /// Files column.
        column: String,
    },
    /// No handler could create the audit snapshot.
    AuditSkipped {
        /// Audited table.
        table: String,
        /// Audit table without a handler.
        audit_table: String,
    },
    /// Writing the audit snapshot failed.
    AuditFailed {
        /// Audited table.
        table: String,
        /// Audit table.
        audit_table: String,
        /// Create error.
        message: String,
    },
}

impl std::fmt::Display for CascadeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CascadeWarning::BlobCleanup { table, column, path, message } => {
                write!(f, "failed to delete file {} of [{}]{}: {}", path, table, column, message)
            }
            CascadeWarning::CacheMirror { table, column, path, message } => {
                write!(f, "failed to delete cached file {} of [{}]{}: {}", path, table, column, message)
            }
            CascadeWarning::MissingCloudStore { table, column, store } => {
                write!(f, "cloud store {} of [{}]{} is not declared", store, table, column)
            }
            CascadeWarning::UnknownBlobContent { table, column } => {
                write!(f, "unknown content in cloud store column [{}]{}", table, column)
            }
            CascadeWarning::AuditSkipped { table, audit_table } => {
                write!(f, "no creator for audit table {} of {}", audit_table, table)
            }
            CascadeWarning::AuditFailed { table, audit_table, message } => {
                write!(f, "failed to write audit entry {} of {}: {}", audit_table, table, message)
            }
        }
    }
}

/// Outcome of a successful cascade.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    /// Rows removed, dependents before the rows they depended on.
    pub deleted: Vec<DeletedRow>,
    /// Non-fatal problems.
    pub warnings: Vec<CascadeWarning>,
}

impl CascadeReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and log a warning.
    pub fn warn(&mut self, warning: CascadeWarning) {
        warn!(warning = %warning, "cascade warning");
        self.warnings.push(warning);
    }

    /// Fold in the report of a nested delete.
    pub fn merge(&mut self, other: CascadeReport) {
        self.deleted.extend(other.deleted);
        self.warnings.extend(other.warnings);
    }

    /// Check whether the delete finished without warnings.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Check whether a row was removed.
    pub fn contains(&self, table: &str, reference_id: &str) -> bool {
        self.deleted
            .iter()
            .any(|row| row.table == table && row.reference_id == reference_id)
    }
}

/// What happens to dependents of a relation when one of its rows goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CascadeStrategy {
    /// Nothing depends on the row through this relation.
    Retain,
    /// Authorize every object by internal id, then purge the join rows.
    PurgeAuthorizedJoinRows,
    /// Authorize every object by reference id, then delete the join rows with hooks.
    DeleteAuthorizedJoinRows,
    /// Delete every subject row whose key points at this row, with hooks.
    DeleteReferencingSubjects,
    /// Purge the join rows pointing at this row.
    PurgeJoinRows,
    /// Delete the join rows pointing at this row, with hooks.
    DeleteJoinRows,
}

impl CascadeStrategy {
    /// Strategy for a relation kind seen from one of its ends.
    pub fn for_relation(kind: RelationKind, role: Role) -> Self {
        match (kind, role) {
            (RelationKind::HasOne | RelationKind::BelongsTo, Role::Subject) => CascadeStrategy::Retain,
            (RelationKind::HasMany, Role::Subject) => CascadeStrategy::PurgeAuthorizedJoinRows,
            (RelationKind::HasManyAndBelongsToMany, Role::Subject) => {
                CascadeStrategy::DeleteAuthorizedJoinRows
            }
            (RelationKind::HasOne | RelationKind::BelongsTo, Role::Object) => {
                CascadeStrategy::DeleteReferencingSubjects
            }
            (RelationKind::HasMany, Role::Object) => CascadeStrategy::PurgeJoinRows,
            (RelationKind::HasManyAndBelongsToMany, Role::Object) => CascadeStrategy::DeleteJoinRows,
        }
    }
}

/// Deletes one row and its dependents inside a caller-owned transaction.
pub(crate) struct CascadeExecutor<'a> {
    registry: &'a ResourceRegistry,
    context: &'a ResourceContext,
    tx: &'a Connection,
}

impl<'a> CascadeExecutor<'a> {
    pub(crate) fn new(
        registry: &'a ResourceRegistry,
        context: &'a ResourceContext,
        tx: &'a Connection,
    ) -> Self {
        Self { registry, context, tx }
    }

    /// Delete the row and everything that depends on it.
    pub(crate) fn execute(
        &self,
        table: &TableDef,
        reference_id: &str,
        request: &Request,
    ) -> Result<CascadeReport, Error> {
        if request.depth() > self.context.max_cascade_depth {
            return Err(Error::CascadeDepthExceeded {
                depth: request.depth(),
            });
        }

        let catalog = self.context.database.catalog();
        let store = RowStore::new(self.tx, catalog);
        let row = store.get_row_by_reference_id(&table.name, reference_id)?;
        let mut report = CascadeReport::new();

        if table.should_audit() {
            AuditRecorder::new(self.registry).record_before_delete(table, &row, request, self.tx, &mut report);
        }

        self.context.blobs.clean(catalog, table, &row, &mut report);

        let is_admin = self.context.policy.is_admin(&request.principal);
        for relation in table.relations() {
            if relation.touches_audit_table() {
                continue;
            }
            let Some(role) = relation.role_of(&table.name) else {
                continue;
            };
            let strategy = CascadeStrategy::for_relation(relation.kind, role);
            debug!(table = %table.name, reference_id, relation = %relation, ?strategy, "cascading");
            self.apply(strategy, relation, &row, &store, request, is_admin, &mut report)?;
        }

        self.remove(table, &row, &store, request, &mut report)?;
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn apply(
        &self,
        strategy: CascadeStrategy,
        relation: &RelationDef,
        row: &Row,
        store: &RowStore<'_>,
        request: &Request,
        is_admin: bool,
        report: &mut CascadeReport,
    ) -> Result<(), Error> {
        let nested = request.derive(Method::Delete);

        match strategy {
            CascadeStrategy::Retain => {}
            CascadeStrategy::PurgeAuthorizedJoinRows => {
                let join_rows = store.join_rows_of_subject(relation, row.id)?;
                if !is_admin {
                    for join_row in &join_rows {
                        let permission = store.permission_by_id(&relation.object, join_row.object_id)?;
                        self.authorize(&permission, relation, row, request)?;
                    }
                }
                let join = self.registry.deleter(relation.join_table_name())?;
                for join_row in join_rows {
                    report.merge(join.purge_without_hooks(&join_row.reference_id, &nested, self.tx)?);
                }
            }
            CascadeStrategy::DeleteAuthorizedJoinRows => {
                let join_rows = store.join_rows_of_subject(relation, row.id)?;
                if !is_admin {
                    for join_row in &join_rows {
                        let permission = match &join_row.object_reference_id {
                            Some(object) => store.permission_by_reference_id(&relation.object, object)?,
                            None => ObjectPermission::empty(),
                        };
                        self.authorize(&permission, relation, row, request)?;
                    }
                }
                let join = self.registry.deleter(relation.join_table_name())?;
                for join_row in join_rows {
                    let response = join.delete_with_transaction(&join_row.reference_id, &nested, self.tx)?;
                    report.merge(response.report);
                }
            }
            CascadeStrategy::DeleteReferencingSubjects => {
                let subjects = store.subjects_referencing(relation, row.id)?;
                if subjects.is_empty() {
                    return Ok(());
                }
                let subject = self.registry.deleter(&relation.subject)?;
                for reference_id in subjects {
                    let response = subject
                        .delete_with_transaction(&reference_id, &nested, self.tx)
                        .inspect_err(|e| {
                            warn!(table = %relation.subject, reference_id = %reference_id, error = %e, "failed to delete dependent row");
                        })?;
                    report.merge(response.report);
                }
            }
            CascadeStrategy::PurgeJoinRows => {
                let join_rows = store.join_rows_of_object(relation, row.id)?;
                if join_rows.is_empty() {
                    return Ok(());
                }
                let join = self.registry.deleter(relation.join_table_name())?;
                for reference_id in join_rows {
                    report.merge(join.purge_without_hooks(&reference_id, &nested, self.tx)?);
                }
            }
            CascadeStrategy::DeleteJoinRows => {
                let join_rows = store.join_rows_of_object(relation, row.id)?;
                if join_rows.is_empty() {
                    return Ok(());
                }
                let join = self.registry.deleter(relation.join_table_name())?;
                for reference_id in join_rows {
                    let response = join.delete_with_transaction(&reference_id, &nested, self.tx)?;
                    report.merge(response.report);
                }
            }
        }

        Ok(())
    }

    fn authorize(
        &self,
        permission: &ObjectPermission,
        relation: &RelationDef,
        row: &Row,
        request: &Request,
    ) -> Result<(), Error> {
        if permission.can_refer_as(&request.principal) {
            return Ok(());
        }
        warn!(
            table = %row.table,
            reference_id = %row.reference_id,
            relation = %relation,
            user = %request.principal.user_reference_id,
            "unauthorized to detach dependent object"
        );
        Err(Error::Unauthorized {
            table: row.table.clone(),
            relation: relation.to_string(),
        })
    }

    fn remove(
        &self,
        table: &TableDef,
        row: &Row,
        store: &RowStore<'_>,
        request: &Request,
        report: &mut CascadeReport,
    ) -> Result<(), Error> {
        if table.translations_enabled && !request.language_preferences.is_empty() {
            for language in &request.language_preferences {
                let removed = store.delete_translation(table, row.id, language)?;
                if removed == 0 {
                    debug!(table = %table.name, reference_id = %row.reference_id, language = %language, "no translation to delete");
                    continue;
                }
                info!(table = %table.name, reference_id = %row.reference_id, language = %language, removed, "deleted translation");
                report.deleted.push(DeletedRow {
                    table: table.name.clone(),
                    reference_id: row.reference_id.clone(),
                    language: Some(language.clone()),
                });
            }
            return Ok(());
        }

        store.delete_by_reference_id(&table.name, &row.reference_id)?;
        info!(table = %table.name, reference_id = %row.reference_id, "deleted row");
        report.deleted.push(DeletedRow {
            table: table.name.clone(),
            reference_id: row.reference_id.clone(),
            language: None,
        });
        Ok(())
    }
}
