//! Server error types.

use thiserror::Error;

/// Coarse classification of a failed delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The row to delete does not exist.
    NotFound,
    /// The principal may not detach a dependent object.
    Unauthorized,
    /// A hook refused or failed the operation.
    HookVeto,
    /// The backing store or the engine itself failed.
    Store,
    /// The server was misconfigured.
    Configuration,
}

/// Server errors. Every variant rolls back the owning transaction.
#[derive(Debug, Error)]
pub enum Error {
    /// Row not found.
    #[error("row not found: [{table}][{reference_id}]")]
    NotFound {
        /// Table that was searched.
        table: String,
        /// Reference id that did not resolve.
        reference_id: String,
    },

    /// A dependent object may not be detached by the principal.
    #[error("the object could not be detached from {relation} on {table}: unauthorized")]
    Unauthorized {
        /// Table of the row being deleted.
        table: String,
        /// The relation whose dependents failed authorization.
        relation: String,
    },

    /// A before hook returned an empty result.
    #[error("cannot delete this object [{hook}][{reference_id}]")]
    HookVeto {
        /// Name of the vetoing hook.
        hook: String,
        /// Reference id of the row.
        reference_id: String,
    },

    /// A hook returned an error.
    #[error("hook {hook} failed: {message}")]
    Hook {
        /// Name of the failing hook.
        hook: String,
        /// Error reported by the hook.
        message: String,
    },

    /// Storage error.
    #[error("storage error: {0}")]
    Store(tabledb_core::Error),

    /// No resource is registered for a table.
    #[error("no handler registered for table {0}")]
    NoHandler(String),

    /// Dependency chain is deeper than allowed.
    #[error("cascade depth {depth} exceeds the configured maximum")]
    CascadeDepthExceeded {
        /// Depth that was reached.
        depth: usize,
    },

    /// The resource registry was dropped while a resource was still in use.
    #[error("resource registry is no longer available")]
    RegistryClosed,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a hook failure.
    pub fn hook(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Hook {
            hook: hook.into(),
            message: message.into(),
        }
    }

    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Unauthorized { .. } => ErrorKind::Unauthorized,
            Error::HookVeto { .. } | Error::Hook { .. } => ErrorKind::HookVeto,
            Error::Config(_) => ErrorKind::Configuration,
            Error::Store(_)
            | Error::NoHandler(_)
            | Error::CascadeDepthExceeded { .. }
            | Error::RegistryClosed
            | Error::Io(_) => ErrorKind::Store,
        }
    }
}

impl From<tabledb_core::Error> for Error {
    fn from(err: tabledb_core::Error) -> Self {
        match err {
            tabledb_core::Error::NotFound {
                table,
                reference_id,
            } => Error::NotFound {
                table,
                reference_id,
            },
            other => Error::Store(other),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Store(tabledb_core::Error::Sqlite(err))
    }
}
