//! SQLite-backed checkpoint store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::unit::{RunId, UnitResult};

use super::store::{decode, encode, CheckpointError, CheckpointStore, PutOutcome};

/// SQLite-backed checkpoint store.
///
/// Several runs can share one database file; rows are keyed by
/// `(run_id, unit_index)`.
pub struct SqliteCheckpointStore {
    conn: Mutex<Connection>,
    run_id: RunId,
}

impl SqliteCheckpointStore {
    /// Opens the database at `path`, creating the file and table if needed.
    pub fn new(path: &Path, run_id: RunId) -> Result<Self, CheckpointError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            run_id,
        })
    }

    /// Creates an in-memory store (useful for testing).
    pub fn in_memory(run_id: RunId) -> Result<Self, CheckpointError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            run_id,
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CheckpointError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                run_id TEXT NOT NULL,
                unit_index INTEGER NOT NULL,
                payload BLOB NOT NULL,
                digest TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (run_id, unit_index)
            );
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_payload(conn: &Connection, run_id: &str, index: usize) -> rusqlite::Result<Option<Vec<u8>>> {
        conn.query_row(
            "SELECT payload FROM checkpoints WHERE run_id = ? AND unit_index = ?",
            params![run_id, index as i64],
            |row| row.get(0),
        )
        .optional()
    }
}

impl CheckpointStore for SqliteCheckpointStore {
    fn has(&self, index: usize) -> Result<bool, CheckpointError> {
        let conn = self.conn();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM checkpoints WHERE run_id = ? AND unit_index = ?",
                params![self.run_id.as_str(), index as i64],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn get(&self, index: usize) -> Result<Option<UnitResult>, CheckpointError> {
        let conn = self.conn();
        Self::read_payload(&conn, self.run_id.as_str(), index)?
            .map(|bytes| decode(index, &bytes))
            .transpose()
    }

    fn put(&self, result: &UnitResult) -> Result<PutOutcome, CheckpointError> {
        let bytes = encode(result)?;
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let outcome = match Self::read_payload(&tx, self.run_id.as_str(), result.index)? {
            Some(existing) if existing == bytes => PutOutcome::Unchanged,
            Some(_) => {
                return Err(CheckpointError::Conflict {
                    index: result.index,
                })
            }
            None => {
                let digest = result.digest().map_err(|source| CheckpointError::Serialize {
                    index: result.index,
                    source,
                })?;
                tx.execute(
                    "INSERT INTO checkpoints (run_id, unit_index, payload, digest, created_at) VALUES (?, ?, ?, ?, ?)",
                    params![
                        self.run_id.as_str(),
                        result.index as i64,
                        bytes,
                        digest,
                        Utc::now().to_rfc3339(),
                    ],
                )?;
                PutOutcome::Written
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    fn indices(&self) -> Result<Vec<usize>, CheckpointError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT unit_index FROM checkpoints WHERE run_id = ? ORDER BY unit_index",
        )?;
        let rows = stmt.query_map(params![self.run_id.as_str()], |row| row.get::<_, i64>(0))?;

        let mut indices = Vec::new();
        for row in rows {
            indices.push(row? as usize);
        }
        Ok(indices)
    }

    fn run_id(&self) -> Option<&RunId> {
        Some(&self.run_id)
    }
}
