//! Database wrapper combining the SQLite connection and the catalog.

use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use tracing::info;

use tabledb_core::{Catalog, SchemaInstaller};

use crate::error::Error;

/// A SQLite database described by a catalog.
///
/// The connection sits behind a mutex; a top-level delete holds the lock for
/// the lifetime of its transaction.
pub struct Database {
    conn: Mutex<Connection>,
    catalog: Arc<Catalog>,
}

/// Shared handle to a database.
pub type SharedDatabase = Arc<Database>;

impl Database {
    /// Open a database file.
    pub fn open(path: &Path, catalog: Catalog) -> Result<Self, Error> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "database opened");
        Ok(Self::from_connection(conn, catalog))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory(catalog: Catalog) -> Result<Self, Error> {
        Ok(Self::from_connection(Connection::open_in_memory()?, catalog))
    }

    fn from_connection(conn: Connection, catalog: Catalog) -> Self {
        Self {
            conn: Mutex::new(conn),
            catalog: Arc::new(catalog),
        }
    }

    /// Create every table of the catalog that does not exist yet.
    pub fn install_schema(&self) -> Result<(), Error> {
        SchemaInstaller::new(&self.catalog).install(&self.conn.lock())?;
        Ok(())
    }

    /// Get a reference to the catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Lock the connection.
    ///
    /// Must not be called from a hook: the delete that runs the hook already
    /// holds the lock.
    pub fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("tables", &self.catalog.tables().count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabledb_core::{ColumnDef, ColumnType, SchemaDocument, TableDef};

    fn catalog() -> Catalog {
        Catalog::new(SchemaDocument::new().with_table(
            TableDef::new("note").with_column(ColumnDef::new("body", ColumnType::Text)),
        ))
        .unwrap()
    }

    #[test]
    fn test_open_file_and_install() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("notes.db");

        let db = Database::open(&path, catalog()).unwrap();
        db.install_schema().unwrap();
        db.lock()
            .execute("INSERT INTO note (reference_id, body) VALUES ('n1', 'hi')", [])
            .unwrap();
        drop(db);

        let db = Database::open(&path, catalog()).unwrap();
        let count: i64 = db
            .lock()
            .query_row("SELECT COUNT(*) FROM note", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_in_memory() {
        let db = Database::open_in_memory(catalog()).unwrap();
        db.install_schema().unwrap();
        assert!(db.catalog().get_table("note").is_some());
    }
}
