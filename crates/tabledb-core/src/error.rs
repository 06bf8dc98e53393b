//! Core error types.

use thiserror::Error;

/// Core database errors.
#[derive(Debug, Error)]
pub enum Error {
    /// SQLite error.
    #[error("storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Row not found.
    #[error("row not found: [{table}][{reference_id}]")]
    NotFound {
        /// Table that was searched.
        table: String,
        /// Reference id that did not resolve.
        reference_id: String,
    },

    /// Table is not part of the catalog.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// Column is not part of the table.
    #[error("unknown column {column} on table {table}")]
    UnknownColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// Identifier rejected by the catalog.
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Schema document failed validation.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Stored value does not match its column type.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// Check whether this error means a row did not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. } | Error::Sqlite(rusqlite::Error::QueryReturnedNoRows)
        )
    }
}
