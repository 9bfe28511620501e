//! `servers` table access.

use rusqlite::{OptionalExtension, params};

use nucleus_shared::{NucleusError, NucleusResult};

use super::{Database, db_err};
use crate::server::{ServerConfig, ServerState};

fn to_json<T: serde::Serialize>(value: &T) -> NucleusResult<String> {
    serde_json::to_string(value).map_err(|e| NucleusError::Database(format!("encode: {}", e)))
}

fn from_json<T: serde::de::DeserializeOwned>(raw: &str) -> NucleusResult<T> {
    serde_json::from_str(raw).map_err(|e| NucleusError::Database(format!("decode: {}", e)))
}

/// Server config/state persistence, keyed by logical name.
#[derive(Clone)]
pub struct ServerStore {
    db: Database,
}

impl ServerStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new record. Fails if the name is already taken.
    pub fn save(&self, config: &ServerConfig, state: &ServerState) -> NucleusResult<()> {
        let conn = self.db.conn();
        let inserted = db_err!(conn.execute(
            "INSERT OR IGNORE INTO servers (name, config, state, status, ctid, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                config.name,
                to_json(config)?,
                to_json(state)?,
                state.status.as_str(),
                state.ctid.map(|c| c.get()),
                config.created_at.to_rfc3339(),
                state.updated_at.to_rfc3339(),
            ],
        ))?;

        if inserted == 0 {
            return Err(NucleusError::Validation(format!(
                "server '{}' already exists",
                config.name
            )));
        }
        Ok(())
    }

    /// Overwrite the mutable state of a record.
    pub fn update_state(&self, name: &str, state: &ServerState) -> NucleusResult<()> {
        let conn = self.db.conn();
        let updated = db_err!(conn.execute(
            "UPDATE servers SET state = ?2, status = ?3, ctid = ?4, updated_at = ?5 WHERE name = ?1",
            params![
                name,
                to_json(state)?,
                state.status.as_str(),
                state.ctid.map(|c| c.get()),
                state.updated_at.to_rfc3339(),
            ],
        ))?;

        if updated == 0 {
            return Err(NucleusError::NotFound(name.to_string()));
        }
        Ok(())
    }

    /// Delete a record. Returns whether one existed.
    pub fn delete(&self, name: &str) -> NucleusResult<bool> {
        let conn = self.db.conn();
        let deleted = db_err!(conn.execute("DELETE FROM servers WHERE name = ?1", params![name]))?;
        Ok(deleted > 0)
    }

    pub fn get(&self, name: &str) -> NucleusResult<Option<(ServerConfig, ServerState)>> {
        let conn = self.db.conn();
        let row: Option<(String, String)> = db_err!(
            conn.query_row(
                "SELECT config, state FROM servers WHERE name = ?1",
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
        )?;

        row.map(|(config, state)| Ok((from_json(&config)?, from_json(&state)?)))
            .transpose()
    }

    /// All records, oldest first.
    pub fn list_all(&self) -> NucleusResult<Vec<(ServerConfig, ServerState)>> {
        let conn = self.db.conn();
        let mut stmt = db_err!(conn.prepare("SELECT config, state FROM servers ORDER BY created_at"))?;
        let rows = db_err!(stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        }))?;

        let mut records = Vec::new();
        for row in rows {
            let (config, state) = db_err!(row)?;
            records.push((from_json(&config)?, from_json(&state)?));
        }
        Ok(records)
    }
}
