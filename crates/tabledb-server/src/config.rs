//! Server configuration.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tabledb_core::{AccessPolicy, Capability, PermissionBits, PermissionScope, Principal};

use crate::cascade::MAX_CASCADE_DEPTH;
use crate::request::Request;

/// Default database file.
pub const DEFAULT_DATABASE_PATH: &str = "./tabledb.sqlite";

/// Default schema document.
pub const DEFAULT_SCHEMA_PATH: &str = "./schema.json";

/// Permission of rows created without one: everything for the owner and
/// granted groups, peek for guests.
pub fn default_row_permission() -> PermissionBits {
    PermissionBits::scope_all(PermissionScope::Owner)
        | PermissionBits::scope_all(PermissionScope::Group)
        | PermissionBits::bit(PermissionScope::Guest, Capability::Peek)
}

/// tabledb configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Path to the JSON schema document.
    pub schema_path: PathBuf,

    /// Members of this group bypass per-object authorization.
    pub admin_group: Option<String>,

    /// Maximum nesting of cascaded deletes.
    pub max_cascade_depth: usize,

    /// Root of the local blob cache mirror (`<root>/<table>/<column>`).
    pub asset_cache_root: Option<PathBuf>,

    /// Permission given to rows created without one.
    pub default_permission: PermissionBits,
}

impl ServerConfig {
    /// Create a configuration for a database file and schema document.
    pub fn new(database_path: impl Into<PathBuf>, schema_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            schema_path: schema_path.into(),
            admin_group: None,
            max_cascade_depth: MAX_CASCADE_DEPTH,
            asset_cache_root: None,
            default_permission: default_row_permission(),
        }
    }

    /// Set the administrator group.
    pub fn with_admin_group(mut self, group: impl Into<String>) -> Self {
        self.admin_group = Some(group.into());
        self
    }

    /// Set the maximum cascade depth.
    pub fn with_max_cascade_depth(mut self, depth: usize) -> Self {
        self.max_cascade_depth = depth;
        self
    }

    /// Mirror blob columns in a local cache.
    pub fn with_asset_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_cache_root = Some(root.into());
        self
    }

    /// Set the permission of newly created rows.
    pub fn with_default_permission(mut self, permission: PermissionBits) -> Self {
        self.default_permission = permission;
        self
    }

    /// Access policy derived from this configuration.
    pub fn access_policy(&self) -> AccessPolicy {
        match &self.admin_group {
            Some(group) => AccessPolicy::new().with_admin_group(group),
            None => AccessPolicy::new(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATABASE_PATH, DEFAULT_SCHEMA_PATH)
    }
}

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "tabledb")]
#[command(version, about = "Cascading deletes over a schema-driven SQLite store", long_about = None)]
pub struct Args {
    /// Path to the SQLite database file.
    #[arg(short, long, default_value = DEFAULT_DATABASE_PATH)]
    pub database: PathBuf,

    /// Path to the JSON schema document.
    #[arg(short, long, default_value = DEFAULT_SCHEMA_PATH)]
    pub schema: PathBuf,

    /// Create missing tables before running the command.
    #[arg(long)]
    pub init: bool,

    /// Group whose members are administrators.
    #[arg(long)]
    pub admin_group: Option<String>,

    /// Maximum nesting of cascaded deletes.
    #[arg(long, default_value_t = MAX_CASCADE_DEPTH)]
    pub max_depth: usize,

    /// Root of the local blob cache mirror.
    #[arg(long)]
    pub asset_cache: Option<PathBuf>,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Commands of the CLI.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Delete a row and everything that depends on it.
    Delete {
        /// Table of the row.
        table: String,

        /// Reference id of the row.
        reference_id: String,

        /// Reference id of the acting user.
        #[arg(long, default_value = "")]
        user: String,

        /// Group the user belongs to (repeatable).
        #[arg(long = "group")]
        groups: Vec<String>,

        /// Act as administrator.
        #[arg(long)]
        admin: bool,

        /// Preferred language; deletes only that translation (repeatable).
        #[arg(long = "lang")]
        languages: Vec<String>,
    },
}

impl Command {
    /// Request a delete command runs with.
    pub fn request(&self) -> Request {
        match self {
            Command::Delete {
                user,
                groups,
                admin,
                languages,
                ..
            } => {
                let mut principal = Principal::user(user.clone());
                principal.groups = groups.clone();
                principal.is_admin = *admin;
                languages
                    .iter()
                    .fold(Request::delete(principal), |request, language| {
                        request.with_language(language.clone())
                    })
            }
        }
    }
}

impl Args {
    /// Convert command-line arguments to a configuration and a command.
    pub fn into_config(self) -> (ServerConfig, Command) {
        let mut config = ServerConfig::new(self.database, self.schema)
            .with_max_cascade_depth(self.max_depth);
        config.admin_group = self.admin_group;
        config.asset_cache_root = self.asset_cache;
        (config, self.command)
    }
}
