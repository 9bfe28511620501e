//! SQLite persistence for server records.
//!
//! Each record is split into an immutable `ServerConfig` and a mutable
//! `ServerState`, stored as JSON blobs alongside queryable columns.

mod schema;
mod servers;

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{Connection, OptionalExtension};

use nucleus_shared::{NucleusError, NucleusResult};

pub use servers::ServerStore;

/// Convert rusqlite errors to `NucleusError::Database`.
macro_rules! db_err {
    ($result:expr) => {
        $result.map_err(|e| NucleusError::Database(e.to_string()))
    };
}

pub(crate) use db_err;

/// SQLite database handle, shared by the domain stores.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the database.
    pub fn open(db_path: &Path) -> NucleusResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = db_err!(Connection::open(db_path))?;

        db_err!(conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=FULL;
            PRAGMA busy_timeout=30000;
            "
        ))?;

        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    fn init_schema(conn: &Connection) -> NucleusResult<()> {
        for sql in schema::all_schemas() {
            db_err!(conn.execute_batch(sql))?;
        }

        let current_version: Option<i32> = db_err!(
            conn.query_row(
                "SELECT version FROM schema_version WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()
        )?;

        match current_version {
            None => {
                db_err!(conn.execute(
                    "INSERT INTO schema_version (id, version, updated_at) VALUES (1, ?1, ?2)",
                    rusqlite::params![schema::SCHEMA_VERSION, Utc::now().to_rfc3339()],
                ))?;
                tracing::info!(
                    version = schema::SCHEMA_VERSION,
                    "Initialized database schema"
                );
            }
            Some(v) if v > schema::SCHEMA_VERSION => {
                return Err(NucleusError::Database(format!(
                    "database schema version {} is newer than supported {}",
                    v,
                    schema::SCHEMA_VERSION
                )));
            }
            Some(_) => {}
        }

        Ok(())
    }
}
