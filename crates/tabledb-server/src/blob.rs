//! Cleanup of attachment files referenced by deleted rows.
//!
//! Blob deletion is best-effort: every failure becomes a [`CascadeWarning`]
//! and never aborts the row deletion it belongs to.

use std::collections::HashMap;
use std::path::{PathBuf, MAIN_SEPARATOR};
use std::sync::Arc;

use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use tabledb_core::{Catalog, Row, TableDef};
use thiserror::Error;
use tokio::runtime::Runtime;
use tracing::debug;
use url::Url;

use crate::cascade::{CascadeReport, CascadeWarning};

/// Parameters of one remote file deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobDeleteRequest {
    /// Credential reference of the store, if any.
    pub oauth_token_id: Option<String>,
    /// Provider name declared on the store.
    pub store_provider: String,
    /// `<path>/<name>` of the file inside the column's key directory.
    pub path: String,
    /// `<store root>/<key_name>`.
    pub root_path: String,
}

/// Errors from a blob store.
#[derive(Debug, Error)]
pub enum BlobError {
    /// The store root could not be resolved.
    #[error("invalid store root {root}: {message}")]
    InvalidRoot {
        /// Root path as configured.
        root: String,
        /// Why it was rejected.
        message: String,
    },

    /// Object store error.
    #[error(transparent)]
    ObjectStore(#[from] object_store::Error),
}

/// Deletes one remote file.
pub trait BlobDeleteAction: Send + Sync {
    /// Delete the file; returns every error encountered.
    fn delete(&self, request: &BlobDeleteRequest) -> Vec<BlobError>;
}

/// Deletes files through the `object_store` crate.
///
/// The root path is either a URL understood by [`object_store::parse_url`]
/// (`file://`, `memory://`, `s3://`, ...) or an existing local directory. The
/// async store calls are driven on a private current-thread runtime, so this
/// must not be used from inside another tokio runtime.
pub struct ObjectStoreDeleteAction {
    runtime: Runtime,
}

impl ObjectStoreDeleteAction {
    /// Create the action and its runtime.
    pub fn new() -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self { runtime })
    }

    fn resolve(root_path: &str) -> Result<(Box<dyn ObjectStore>, ObjectPath), BlobError> {
        match Url::parse(root_path) {
            // Single-letter schemes are Windows drive letters, not URLs.
            Ok(url) if url.scheme().len() > 1 => {
                let (store, prefix) = object_store::parse_url(&url)?;
                Ok((store, prefix))
            }
            _ => {
                if !std::path::Path::new(root_path).is_dir() {
                    return Err(BlobError::InvalidRoot {
                        root: root_path.to_string(),
                        message: "directory does not exist".to_string(),
                    });
                }
                let store = LocalFileSystem::new_with_prefix(root_path)?;
                Ok((Box::new(store), ObjectPath::default()))
            }
        }
    }
}

impl BlobDeleteAction for ObjectStoreDeleteAction {
    fn delete(&self, request: &BlobDeleteRequest) -> Vec<BlobError> {
        let (store, prefix) = match Self::resolve(&request.root_path) {
            Ok(resolved) => resolved,
            Err(e) => return vec![e],
        };

        let location: ObjectPath = prefix
            .parts()
            .chain(ObjectPath::from(request.path.as_str()).parts())
            .collect();

        debug!(
            provider = %request.store_provider,
            credential = request.oauth_token_id.is_some(),
            location = %location,
            "deleting remote file"
        );

        match self.runtime.block_on(store.delete(&location)) {
            Ok(()) => Vec::new(),
            Err(e) => vec![BlobError::ObjectStore(e)],
        }
    }
}

/// Local mirror of a blob column's files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFolderCache {
    root: PathBuf,
}

impl AssetFolderCache {
    /// Mirror rooted at a directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Remove a cached file by its relative name.
    pub fn delete_file_by_name(&self, name: &str) -> std::io::Result<()> {
        std::fs::remove_file(self.root.join(name))
    }
}

/// Deletes the blobs of a row's files columns.
pub struct BlobCleaner {
    action: Arc<dyn BlobDeleteAction>,
    caches: HashMap<(String, String), AssetFolderCache>,
    cache_root: Option<PathBuf>,
}

impl BlobCleaner {
    /// Cleaner using the given delete action.
    pub fn new(action: Arc<dyn BlobDeleteAction>) -> Self {
        Self {
            action,
            caches: HashMap::new(),
            cache_root: None,
        }
    }

    /// Register a local mirror for one column.
    pub fn with_cache(
        mut self,
        table: impl Into<String>,
        column: impl Into<String>,
        cache: AssetFolderCache,
    ) -> Self {
        self.caches.insert((table.into(), column.into()), cache);
        self
    }

    /// Mirror every column at `<root>/<table>/<column>` unless registered explicitly.
    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = Some(root.into());
        self
    }

    fn cache_for(&self, table: &str, column: &str) -> Option<AssetFolderCache> {
        self.caches
            .get(&(table.to_string(), column.to_string()))
            .cloned()
            .or_else(|| {
                self.cache_root
                    .as_ref()
                    .map(|root| AssetFolderCache::new(root.join(table).join(column)))
            })
    }

    /// Delete every blob referenced by the row, recording failures as warnings.
    pub fn clean(&self, catalog: &Catalog, table: &TableDef, row: &Row, report: &mut CascadeReport) {
        for column in table.cloud_store_columns() {
            let Some(key) = column.cloud_store_key() else {
                continue;
            };
            let Some(store) = catalog.cloud_store(&key.namespace) else {
                report.warn(CascadeWarning::MissingCloudStore {
                    table: table.name.clone(),
                    column: column.name.clone(),
                    store: key.namespace.clone(),
                });
                continue;
            };

            let Some(value) = row.get(&column.name).filter(|value| !value.is_null()) else {
                continue;
            };
            let Some(files) = value.as_files() else {
                report.warn(CascadeWarning::UnknownBlobContent {
                    table: table.name.clone(),
                    column: column.name.clone(),
                });
                continue;
            };

            let root_path = format!("{}/{}", store.root_path.trim_end_matches('/'), key.key_name);
            let cache = self.cache_for(&table.name, &column.name);

            for file in files {
                let request = BlobDeleteRequest {
                    oauth_token_id: store.oauth_token_id.clone(),
                    store_provider: store.store_provider.clone(),
                    path: file.location(),
                    root_path: root_path.clone(),
                };

                for error in self.action.delete(&request) {
                    report.warn(CascadeWarning::BlobCleanup {
                        table: table.name.clone(),
                        column: column.name.clone(),
                        path: request.path.clone(),
                        message: error.to_string(),
                    });
                }

                if let Some(cache) = &cache {
                    let name = file.location_with(MAIN_SEPARATOR);
                    match cache.delete_file_by_name(&name) {
                        Ok(()) => {}
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                            debug!(table = %table.name, column = %column.name, file = %name, "file not in local cache");
                        }
                        Err(e) => report.warn(CascadeWarning::CacheMirror {
                            table: table.name.clone(),
                            column: column.name.clone(),
                            path: name,
                            message: e.to_string(),
                        }),
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for BlobCleaner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobCleaner")
            .field("caches", &self.caches)
            .field("cache_root", &self.cache_root)
            .finish_non_exhaustive()
    }
}
