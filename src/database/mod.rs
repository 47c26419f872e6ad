//! # Storage
//!
//! The embedded DuckDB database that uploads are materialized into, plus
//! identifier handling, table creation, row loading and read-only queries.
pub mod identifier;
pub mod loader;
pub mod preview;
pub mod table;

use crate::database::identifier::qualified_name;
use crate::database::identifier::quote_identifier;
use crate::database::identifier::validate;
use crate::error::SheetIngestError;
use duckdb::Connection;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

/// Shared handle on the database. Each unit of work gets its own connection
/// through [`Database::connect`].
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, SheetIngestError> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, SheetIngestError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens a new connection on the same database.
    pub fn connect(&self) -> Result<Connection, SheetIngestError> {
        let conn = self.conn
            .lock()
            .map_err(|_| SheetIngestError::WithContextError("database handle is poisoned".to_owned()))?;
        Ok(conn.try_clone()?)
    }

    /// Creates `schema` if it does not exist.
    pub fn ensure_schema(&self, schema: &str) -> Result<(), SheetIngestError> {
        let sql = format!("CREATE SCHEMA IF NOT EXISTS {}", quote_identifier(validate(schema)?));
        self.connect()?.execute_batch(&sql)?;
        Ok(())
    }

    /// Returns true if `schema.table` exists as a base table.
    pub fn table_exists(&self, schema: &str, table: &str) -> Result<bool, SheetIngestError> {
        qualified_name(schema, table)?;
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            "SELECT count(*) FROM information_schema.tables \
             WHERE table_schema = ? AND table_name = ? AND table_type = 'BASE TABLE'",
            [schema, table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
