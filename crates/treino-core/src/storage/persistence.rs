//! Local collection persistence
//!
//! The authoritative device keeps its whole collection as one blob in a
//! SQLite key-value table. The blob uses the same JSON encoding as the
//! collection payload sent to the mirror.
//!
//! `load` and `save` never fail: a missing or undecodable blob loads as an
//! empty collection, and a failed save is logged while the in-memory
//! collection stays authoritative. The `try_*` variants expose the errors.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::error::{StorageError, StorageResult};
use super::schema::{init_schema, needs_init};
use crate::config::Config;
use crate::models::WorkoutGroup;
use crate::sync::payload::{decode_collection, encode_collection};

/// Well-known key holding the workout collection
pub const WORKOUT_GROUPS_KEY: &str = "workoutGroups";

/// Durable key-value store for the authoritative collection
pub struct LocalStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl LocalStore {
    /// Open or create the database in the configured data directory
    pub fn open(config: &Config) -> StorageResult<Self> {
        Self::open_at(&config.database_path())
    }

    /// Open or create the database at a specific path
    pub fn open_at(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        if needs_init(&conn) {
            init_schema(&conn)?;
        }

        debug!("Opened local store at {:?}", path);
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn, path: None })
    }

    /// Path of the database file, `None` when in memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Get a reference to the underlying connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Load the collection, falling back to an empty one
    pub fn load(&self) -> Vec<WorkoutGroup> {
        match self.try_load() {
            Ok(Some(groups)) => groups,
            Ok(None) => Vec::new(),
            Err(e) => {
                e.report("Discarding stored workout groups");
                Vec::new()
            }
        }
    }

    /// Save the collection, logging any failure
    pub fn save(&self, groups: &[WorkoutGroup]) {
        if let Err(e) = self.try_save(groups) {
            e.report("Failed to save workout groups");
        }
    }

    /// Load the collection
    ///
    /// Returns `None` if nothing has been saved yet.
    pub fn try_load(&self) -> StorageResult<Option<Vec<WorkoutGroup>>> {
        let Some(bytes) = self.get_blob(WORKOUT_GROUPS_KEY)? else {
            return Ok(None);
        };

        let groups = decode_collection(&bytes).map_err(|e| StorageError::InvalidFormat {
            key: WORKOUT_GROUPS_KEY.to_string(),
            details: e.to_string(),
        })?;

        Ok(Some(groups))
    }

    /// Save the collection
    pub fn try_save(&self, groups: &[WorkoutGroup]) -> StorageResult<()> {
        let bytes = encode_collection(groups).map_err(|e| StorageError::InvalidFormat {
            key: WORKOUT_GROUPS_KEY.to_string(),
            details: e.to_string(),
        })?;
        self.put_blob(WORKOUT_GROUPS_KEY, &bytes)
    }

    /// Read a raw blob
    pub fn get_blob(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Write a raw blob, replacing any previous value
    pub fn put_blob(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    /// Remove a blob; removing a missing key is a no-op
    pub fn delete_blob(&self, key: &str) -> StorageResult<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(())
    }
}
