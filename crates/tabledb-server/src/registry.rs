//! Registry of per-table resources.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use rusqlite::Connection;
use tabledb_core::{AccessPolicy, Fields, PermissionBits};
use tracing::info;

use crate::blob::{BlobCleaner, ObjectStoreDeleteAction};
use crate::cascade::CascadeReport;
use crate::config::ServerConfig;
use crate::database::SharedDatabase;
use crate::error::Error;
use crate::hooks::HookRegistry;
use crate::request::Request;
use crate::resource::{DbResource, DeleteResponse, ResourceContext};

/// Something rows can be deleted from.
pub trait Deletable: Send + Sync {
    /// Table served by this handler.
    fn table_name(&self) -> &str;

    /// Delete a row in a transaction of its own, with hooks.
    fn delete(&self, reference_id: &str, request: &Request) -> Result<DeleteResponse, Error>;

    /// Delete a row with hooks inside a caller-owned transaction.
    fn delete_with_transaction(
        &self,
        reference_id: &str,
        request: &Request,
        tx: &Connection,
    ) -> Result<DeleteResponse, Error>;

    /// Delete a row and its dependents without running delete hooks.
    fn purge_without_hooks(
        &self,
        reference_id: &str,
        request: &Request,
        tx: &Connection,
    ) -> Result<CascadeReport, Error>;
}

/// Something rows can be created in.
pub trait Creatable: Send + Sync {
    /// Create a row with hooks inside a caller-owned transaction.
    ///
    /// Returns the reference id of the new row.
    fn create_with_transaction(
        &self,
        record: Fields,
        request: &Request,
        tx: &Connection,
    ) -> Result<String, Error>;
}

/// Handlers keyed by table name. Built once, read-only afterwards.
pub struct ResourceRegistry {
    deleters: HashMap<String, Arc<dyn Deletable>>,
    creators: HashMap<String, Arc<dyn Creatable>>,
}

impl ResourceRegistry {
    /// Start building a registry over a database.
    pub fn builder(database: SharedDatabase) -> RegistryBuilder {
        RegistryBuilder::new(database)
    }

    /// Handler deleting from a table.
    pub fn deleter(&self, table: &str) -> Result<Arc<dyn Deletable>, Error> {
        self.deleters
            .get(table)
            .cloned()
            .ok_or_else(|| Error::NoHandler(table.to_string()))
    }

    /// Handler creating in a table, if any.
    pub fn creator(&self, table: &str) -> Option<Arc<dyn Creatable>> {
        self.creators.get(table).cloned()
    }

    /// Tables with a delete handler.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.deleters.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tables: Vec<&str> = self.tables().collect();
        tables.sort_unstable();
        f.debug_struct("ResourceRegistry").field("tables", &tables).finish()
    }
}

/// Builder for [`ResourceRegistry`].
pub struct RegistryBuilder {
    database: SharedDatabase,
    hooks: HookRegistry,
    blobs: Option<BlobCleaner>,
    policy: AccessPolicy,
    max_cascade_depth: usize,
    default_permission: PermissionBits,
    cache_root: Option<std::path::PathBuf>,
    excluded: HashSet<String>,
}

impl RegistryBuilder {
    fn new(database: SharedDatabase) -> Self {
        let config = ServerConfig::default();
        Self {
            database,
            hooks: HookRegistry::new(),
            blobs: None,
            policy: AccessPolicy::new(),
            max_cascade_depth: config.max_cascade_depth,
            default_permission: config.default_permission,
            cache_root: None,
            excluded: HashSet::new(),
        }
    }

    /// Take policy, limits and cache settings from a configuration.
    pub fn with_config(mut self, config: &ServerConfig) -> Self {
        self.policy = config.access_policy();
        self.max_cascade_depth = config.max_cascade_depth;
        self.default_permission = config.default_permission;
        self.cache_root = config.asset_cache_root.clone();
        self
    }

    /// Set the hooks every resource runs.
    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    /// Use a specific blob cleaner instead of the object store one.
    pub fn with_blob_cleaner(mut self, blobs: BlobCleaner) -> Self {
        self.blobs = Some(blobs);
        self
    }

    /// Set who counts as an administrator.
    pub fn with_policy(mut self, policy: AccessPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the nesting limit of cascades.
    pub fn with_max_cascade_depth(mut self, depth: usize) -> Self {
        self.max_cascade_depth = depth;
        self
    }

    /// Leave a table without handlers.
    pub fn without_handler(mut self, table: impl Into<String>) -> Self {
        self.excluded.insert(table.into());
        self
    }

    /// Build the registry with one resource per catalog table.
    pub fn build(self) -> Result<Arc<ResourceRegistry>, Error> {
        let blobs = match self.blobs {
            Some(blobs) => blobs,
            None => {
                let cleaner = BlobCleaner::new(Arc::new(ObjectStoreDeleteAction::new()?));
                match &self.cache_root {
                    Some(root) => cleaner.with_cache_root(root),
                    None => cleaner,
                }
            }
        };

        let context = Arc::new(ResourceContext {
            database: self.database,
            hooks: self.hooks,
            blobs,
            policy: self.policy,
            max_cascade_depth: self.max_cascade_depth,
            default_permission: self.default_permission,
        });
        let excluded = self.excluded;

        let registry = Arc::new_cyclic(|registry: &Weak<ResourceRegistry>| {
            let mut deleters: HashMap<String, Arc<dyn Deletable>> = HashMap::new();
            let mut creators: HashMap<String, Arc<dyn Creatable>> = HashMap::new();

            for table in context.database.catalog().tables() {
                if excluded.contains(&table.name) {
                    continue;
                }
                let resource = Arc::new(DbResource::new(
                    table.name.clone(),
                    Arc::clone(&context),
                    registry.clone(),
                ));
                deleters.insert(table.name.clone(), resource.clone());
                creators.insert(table.name.clone(), resource);
            }

            ResourceRegistry { deleters, creators }
        });

        info!(resources = registry.deleters.len(), "resource registry built");
        Ok(registry)
    }
}
