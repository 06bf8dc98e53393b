//! tabledb server library.
//!
//! Per-table resources over a SQLite database, the before/after hook
//! pipeline, and the cascade executor that deletes a row together with
//! everything that depends on it.

pub mod audit;
pub mod blob;
pub mod cascade;
pub mod config;
pub mod database;
pub mod error;
pub mod hooks;
pub mod registry;
pub mod request;
pub mod resource;

pub use audit::AuditRecorder;
pub use blob::{
    AssetFolderCache, BlobCleaner, BlobDeleteAction, BlobDeleteRequest, BlobError,
    ObjectStoreDeleteAction,
};
pub use cascade::{CascadeReport, CascadeStrategy, CascadeWarning, DeletedRow, MAX_CASCADE_DEPTH};
pub use config::{Args, Command, ServerConfig};
pub use database::{Database, SharedDatabase};
pub use error::{Error, ErrorKind};
pub use hooks::{HookContext, HookRegistry, Interceptor};
pub use registry::{Creatable, Deletable, RegistryBuilder, ResourceRegistry};
pub use request::{Method, Request};
pub use resource::{DbResource, DeleteResponse};
