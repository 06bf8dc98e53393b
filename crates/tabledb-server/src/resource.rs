//! Per-table resource: the transaction boundary and hook pipeline around
//! the cascade executor.

use std::sync::{Arc, Weak};

use rusqlite::Connection;
use serde::Serialize;
use tabledb_core::catalog::{OWNER_COLUMN, PERMISSION_COLUMN, REFERENCE_ID_COLUMN};
use tabledb_core::row::field;
use tabledb_core::{AccessPolicy, Fields, PermissionBits, RowStore, Value};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::blob::BlobCleaner;
use crate::cascade::{CascadeExecutor, CascadeReport};
use crate::database::SharedDatabase;
use crate::error::Error;
use crate::hooks::{HookContext, HookRegistry};
use crate::registry::{Creatable, Deletable, ResourceRegistry};
use crate::request::Request;

/// Status of a successful delete.
pub const STATUS_OK: u16 = 200;

/// Answer to a successful delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteResponse {
    /// HTTP-style status code.
    pub status: u16,
    /// What the cascade removed and what it warned about.
    pub report: CascadeReport,
}

impl DeleteResponse {
    fn ok(report: CascadeReport) -> Self {
        Self {
            status: STATUS_OK,
            report,
        }
    }
}

/// Services shared by every resource of a registry.
pub(crate) struct ResourceContext {
    pub(crate) database: SharedDatabase,
    pub(crate) hooks: HookRegistry,
    pub(crate) blobs: BlobCleaner,
    pub(crate) policy: AccessPolicy,
    pub(crate) max_cascade_depth: usize,
    pub(crate) default_permission: PermissionBits,
}

/// Handler for one table.
pub struct DbResource {
    table: String,
    context: Arc<ResourceContext>,
    registry: Weak<ResourceRegistry>,
}

impl DbResource {
    pub(crate) fn new(
        table: String,
        context: Arc<ResourceContext>,
        registry: Weak<ResourceRegistry>,
    ) -> Self {
        Self {
            table,
            context,
            registry,
        }
    }

    fn registry(&self) -> Result<Arc<ResourceRegistry>, Error> {
        self.registry.upgrade().ok_or(Error::RegistryClosed)
    }

    fn hook_context<'a>(&'a self, request: &'a Request, tx: &'a Connection) -> HookContext<'a> {
        HookContext {
            table: &self.table,
            request,
            tx,
        }
    }
}

impl Deletable for DbResource {
    fn table_name(&self) -> &str {
        &self.table
    }

    fn delete(&self, reference_id: &str, request: &Request) -> Result<DeleteResponse, Error> {
        let mut conn = self.context.database.lock();
        let tx = conn.transaction()?;
        info!(table = %self.table, reference_id, "delete");

        match self.delete_with_transaction(reference_id, request, &tx) {
            Ok(response) => {
                tx.commit()?;
                Ok(response)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback() {
                    error!(table = %self.table, reference_id, error = %rollback, "failed to rollback");
                }
                Err(e)
            }
        }
    }

    fn delete_with_transaction(
        &self,
        reference_id: &str,
        request: &Request,
        tx: &Connection,
    ) -> Result<DeleteResponse, Error> {
        let ctx = self.hook_context(request, tx);
        self.context.hooks.before_delete(&ctx, reference_id)?;

        let report = self.purge_without_hooks(reference_id, request, tx)?;

        self.context.hooks.after_delete(&ctx, reference_id)?;
        Ok(DeleteResponse::ok(report))
    }

    fn purge_without_hooks(
        &self,
        reference_id: &str,
        request: &Request,
        tx: &Connection,
    ) -> Result<CascadeReport, Error> {
        let registry = self.registry()?;
        let table = self.context.database.catalog().table(&self.table)?;
        CascadeExecutor::new(&registry, &self.context, tx).execute(table, reference_id, request)
    }
}

impl Creatable for DbResource {
    fn create_with_transaction(
        &self,
        record: Fields,
        request: &Request,
        tx: &Connection,
    ) -> Result<String, Error> {
        let mut record = record;
        if field(&record, REFERENCE_ID_COLUMN).is_none() {
            record.push((
                REFERENCE_ID_COLUMN.to_string(),
                Value::Text(Uuid::new_v4().to_string()),
            ));
        }
        if field(&record, PERMISSION_COLUMN).is_none() {
            record.push((
                PERMISSION_COLUMN.to_string(),
                Value::Integer(self.context.default_permission.0),
            ));
        }
        let user = &request.principal.user_reference_id;
        if field(&record, OWNER_COLUMN).is_none() && !user.is_empty() {
            record.push((OWNER_COLUMN.to_string(), Value::Text(user.clone())));
        }

        let ctx = self.hook_context(request, tx);
        let record = self.context.hooks.before_create(&ctx, record)?;

        let reference_id = field(&record, REFERENCE_ID_COLUMN)
            .and_then(Value::as_text)
            .map(str::to_string)
            .ok_or_else(|| Error::hook("before create", "record lost its reference_id"))?;

        let store = RowStore::new(tx, self.context.database.catalog());
        let id = store.insert(&self.table, &record)?;
        debug!(table = %self.table, id, reference_id = %reference_id, "created row");

        let mut created = record;
        created.insert(0, ("id".to_string(), Value::Integer(id)));
        self.context.hooks.after_create(&ctx, &created)?;

        Ok(reference_id)
    }
}

impl std::fmt::Debug for DbResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbResource").field("table", &self.table).finish_non_exhaustive()
    }
}
