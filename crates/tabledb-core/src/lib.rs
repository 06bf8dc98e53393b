//! tabledb core - schema catalog, typed rows, permissions and the SQLite row store.
//!
//! This crate holds everything the delete engine reads: table and relation
//! metadata, typed row values, the permission model and the parameterized
//! statements that touch the backing store.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod catalog;
pub mod error;
pub mod row;
pub mod security;
pub mod storage;

pub use catalog::{
    is_audit_table, Catalog, CloudStore, ColumnDef, ColumnType, DataSource, ForeignKeyData,
    RelationDef, RelationKind, Role, SchemaDocument, TableDef, AUDIT_SUFFIX, I18N_SUFFIX,
};
pub use error::Error;
pub use row::{BlobDescriptor, Fields, Row, Value};
pub use security::{
    AccessPolicy, Capability, GroupPermission, ObjectPermission, PermissionBits, PermissionScope,
    Principal,
};
pub use storage::{quote_ident, JoinRow, RowStore, SchemaInstaller, GROUP_PERMISSION_TABLE};

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
