//! Database connection and schema management.

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

use crate::storage::error::StorageResult;

/// Database connection wrapper.
///
/// Manages SQLite connection and schema initialization.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a new database connection at the specified path.
    ///
    /// # Errors
    /// * `StorageError::Connection` - If the database connection fails
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Opens an in-memory database for testing.
    ///
    /// # Errors
    /// * `StorageError::Connection` - If the database connection fails
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Gets a reference to the underlying connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Gets a mutable reference to the underlying connection.
    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Wraps the database for sharing between components.
    #[must_use]
    pub fn into_shared(self) -> SharedDatabase {
        SharedDatabase(Arc::new(Mutex::new(self)))
    }

    /// Initializes the database schema.
    fn init_schema(&self) -> StorageResult<()> {
        info!("Initializing database schema");

        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS adapter_families (
                name TEXT PRIMARY KEY,
                domain TEXT NOT NULL,
                base_model TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        // The unique constraint backs up the registry lock: a version number
        // can never be issued twice within a family.
        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS adapter_versions (
                id TEXT PRIMARY KEY,
                family TEXT NOT NULL,
                major INTEGER NOT NULL,
                minor INTEGER NOT NULL,
                patch INTEGER NOT NULL,
                artifact_path TEXT NOT NULL,
                base_model TEXT NOT NULL,
                method TEXT NOT NULL,
                hyperparams_json TEXT NOT NULL,
                checksum TEXT NOT NULL,
                status TEXT NOT NULL,
                audit_json TEXT NOT NULL,
                job_id TEXT,
                created_at TEXT NOT NULL,
                UNIQUE (family, major, minor, patch),
                FOREIGN KEY (family) REFERENCES adapter_families(name)
            )
            "#,
            [],
        )?;

        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS golden_datasets (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                version INTEGER NOT NULL,
                samples_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (name, version)
            )
            "#,
            [],
        )?;

        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS evaluation_results (
                id TEXT PRIMARY KEY,
                adapter_version_id TEXT NOT NULL,
                golden_dataset_id TEXT NOT NULL,
                aggregate_score REAL NOT NULL,
                pass_rate REAL NOT NULL,
                failed_samples INTEGER NOT NULL,
                samples_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (adapter_version_id) REFERENCES adapter_versions(id),
                FOREIGN KEY (golden_dataset_id) REFERENCES golden_datasets(id)
            )
            "#,
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_adapter_versions_family ON adapter_versions(family)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_evaluation_results_version ON evaluation_results(adapter_version_id)",
            [],
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}

/// A database shared between the registry, golden dataset store, and
/// evaluator. The mutex is the single serialization point for writes.
#[derive(Clone)]
pub struct SharedDatabase(Arc<Mutex<Database>>);

impl SharedDatabase {
    pub fn lock(&self) -> MutexGuard<'_, Database> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SharedDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedDatabase").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_creates_tables() {
        let db = Database::open_in_memory().unwrap();
        let mut stmt = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        let tables: Vec<String> =
            stmt.query_map([], |row| row.get(0)).unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(
            tables,
            vec!["adapter_families", "adapter_versions", "evaluation_results", "golden_datasets"]
        );
    }

    #[test]
    fn test_open_file_is_idempotent() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("forge.db");
        drop(Database::open(&path).unwrap());
        assert!(Database::open(&path).is_ok());
    }
}
