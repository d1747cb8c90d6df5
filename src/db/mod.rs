pub mod queries;
pub mod schema;
pub mod tags;

use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

use crate::error::{Error, Result};

pub use queries::{CommandRow, StoreStats};

/// Durable store for command summaries, embeddings and tags.
///
/// The connection sits behind a mutex so one handle can be shared across
/// tasks; `close` releases it and every later call fails with
/// `Error::NotInitialized`.
pub struct Store {
    conn: Mutex<Option<Connection>>,
}

impl Store {
    /// Opens or creates the database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Io(format!("failed to create {}: {}", parent.display(), e)))?;
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::Storage(format!("failed to open {}: {}", path.display(), e)))?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;
        schema::create_schema(&conn)?;

        log::debug!("Opened store at {:?}", path);
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Opens an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::create_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.conn.lock();
        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(Error::NotInitialized("store")),
        }
    }

    pub fn is_open(&self) -> bool {
        self.conn.lock().is_some()
    }

    /// Closes the connection. Safe to call more than once.
    pub fn close(&self) {
        if let Some(conn) = self.conn.lock().take() {
            if let Err((_, e)) = conn.close() {
                log::warn!("Error closing store: {}", e);
            }
        }
    }

    // Delegated query methods

    pub fn register_command(&self, command_id: &str, content_hash: &str) -> Result<()> {
        self.with_conn(|c| queries::register_command(c, command_id, content_hash))
    }

    pub fn upsert_summary(
        &self,
        command_id: &str,
        content_hash: &str,
        summary: &str,
        security_warning: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|c| {
            queries::upsert_summary(c, command_id, content_hash, summary, security_warning)
        })
    }

    pub fn upsert_embedding(&self, command_id: &str, embedding: &[f32]) -> Result<()> {
        self.with_conn(|c| queries::upsert_embedding(c, command_id, embedding))
    }

    pub fn upsert_embedding_for(
        &self,
        command_id: &str,
        source_hash: &str,
        embedding: &[f32],
    ) -> Result<()> {
        self.with_conn(|c| queries::upsert_embedding_for(c, command_id, source_hash, embedding))
    }

    pub fn import_legacy_record(
        &self,
        command_id: &str,
        content_hash: &str,
        summary: Option<&str>,
        last_updated: &str,
    ) -> Result<bool> {
        self.with_conn(|c| {
            queries::import_legacy_record(c, command_id, content_hash, summary, last_updated)
        })
    }

    pub fn get_row(&self, command_id: &str) -> Result<Option<CommandRow>> {
        self.with_conn(|c| queries::get_row(c, command_id))
    }

    pub fn get_all_rows(&self) -> Result<Vec<CommandRow>> {
        self.with_conn(queries::get_all_rows)
    }

    pub fn get_rows_missing_embedding(&self) -> Result<Vec<CommandRow>> {
        self.with_conn(queries::get_rows_missing_embedding)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.with_conn(queries::stats)
    }

    pub fn add_tag(&self, command_id: &str, tag_name: &str) -> Result<bool> {
        self.with_conn(|c| tags::add_tag(c, command_id, tag_name))
    }

    pub fn remove_tag(&self, command_id: &str, tag_name: &str) -> Result<bool> {
        self.with_conn(|c| tags::remove_tag(c, command_id, tag_name))
    }

    pub fn move_in_tag(&self, command_id: &str, tag_name: &str, new_index: usize) -> Result<()> {
        self.with_conn(|c| tags::move_in_tag(c, command_id, tag_name, new_index))
    }

    pub fn get_command_ids_by_tag(&self, tag_name: &str) -> Result<Vec<String>> {
        self.with_conn(|c| tags::get_command_ids_by_tag(c, tag_name))
    }

    pub fn get_tags_for_command(&self, command_id: &str) -> Result<Vec<String>> {
        self.with_conn(|c| tags::get_tags_for_command(c, command_id))
    }

    pub fn list_tags(&self) -> Result<Vec<String>> {
        self.with_conn(tags::list_tags)
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        self.close();
    }
}
