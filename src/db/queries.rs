use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{Error, Result};

/// Full command row from the database
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CommandRow {
    pub command_id: String,
    pub content_hash: String,
    pub summary: Option<String>,
    pub security_warning: Option<String>,
    #[serde(skip_serializing)]
    pub embedding: Option<Vec<f32>>,
    pub last_updated: String,
}

/// Row counts used for status output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    pub commands: usize,
    pub summarised: usize,
    pub embedded: usize,
}

const ROW_COLUMNS: &str =
    "command_id, content_hash, summary, security_warning, embedding, last_updated";

fn map_row(row: &Row<'_>) -> rusqlite::Result<CommandRow> {
    let blob: Option<Vec<u8>> = row.get(4)?;
    Ok(CommandRow {
        command_id: row.get(0)?,
        content_hash: row.get(1)?,
        summary: row.get(2)?,
        security_warning: row.get(3)?,
        embedding: blob.map(|b| bytes_to_embedding(&b)),
        last_updated: row.get(5)?,
    })
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Registers a command. An existing row only has its hash refreshed while it
/// has no summary, so a summarised row keeps the hash its summary came from.
pub fn register_command(conn: &Connection, command_id: &str, content_hash: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO commands (command_id, content_hash, last_updated)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(command_id) DO UPDATE SET
            content_hash = excluded.content_hash,
            last_updated = excluded.last_updated
         WHERE commands.summary IS NULL AND commands.content_hash <> excluded.content_hash",
        params![command_id, content_hash, now()],
    )?;
    Ok(())
}

/// Sets the summary fields of a command, creating the row if needed.
/// The embedding is left alone; it becomes stale through the hash change.
pub fn upsert_summary(
    conn: &Connection,
    command_id: &str,
    content_hash: &str,
    summary: &str,
    security_warning: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO commands (command_id, content_hash, summary, security_warning, last_updated)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(command_id) DO UPDATE SET
            content_hash = excluded.content_hash,
            summary = excluded.summary,
            security_warning = excluded.security_warning,
            last_updated = excluded.last_updated",
        params![command_id, content_hash, summary, security_warning, now()],
    )?;
    Ok(())
}

/// Stores an embedding for a command that already has a summary, computed
/// from the row's current summary
pub fn upsert_embedding(conn: &Connection, command_id: &str, embedding: &[f32]) -> Result<()> {
    write_embedding(conn, command_id, None, embedding)
}

/// Stores an embedding computed from the summary of `source_hash`. If the
/// summary moved on while the vector was computed, the row keeps the vector
/// but stays stale until it is embedded again.
pub fn upsert_embedding_for(
    conn: &Connection,
    command_id: &str,
    source_hash: &str,
    embedding: &[f32],
) -> Result<()> {
    write_embedding(conn, command_id, Some(source_hash), embedding)
}

fn write_embedding(
    conn: &Connection,
    command_id: &str,
    source_hash: Option<&str>,
    embedding: &[f32],
) -> Result<()> {
    let bytes = embedding_to_bytes(embedding);
    let changed = conn.execute(
        "UPDATE commands
         SET embedding = ?2, embedded_hash = COALESCE(?4, content_hash), last_updated = ?3
         WHERE command_id = ?1 AND summary IS NOT NULL AND summary <> ''",
        params![command_id, bytes, now(), source_hash],
    )?;

    if changed == 0 {
        return match get_row(conn, command_id)? {
            Some(_) => Err(Error::MissingSummary(command_id.to_string())),
            None => Err(Error::NotFound(command_id.to_string())),
        };
    }

    Ok(())
}

/// Imports one record from the legacy summary file. Returns whether the row
/// changed; rows that already carry a summary are never overwritten.
pub fn import_legacy_record(
    conn: &Connection,
    command_id: &str,
    content_hash: &str,
    summary: Option<&str>,
    last_updated: &str,
) -> Result<bool> {
    let summary = summary.map(str::trim).filter(|s| !s.is_empty());
    let changed = conn.execute(
        "INSERT INTO commands (command_id, content_hash, summary, last_updated)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(command_id) DO UPDATE SET
            content_hash = excluded.content_hash,
            summary = excluded.summary,
            last_updated = excluded.last_updated
         WHERE commands.summary IS NULL AND excluded.summary IS NOT NULL",
        params![command_id, content_hash, summary, last_updated],
    )?;
    Ok(changed > 0)
}

/// Gets a full command row by ID
pub fn get_row(conn: &Connection, command_id: &str) -> Result<Option<CommandRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ROW_COLUMNS} FROM commands WHERE command_id = ?1"
    ))?;
    let row = stmt.query_row(params![command_id], map_row).optional()?;
    Ok(row)
}

/// Lists every command row in registration order
pub fn get_all_rows(conn: &Connection) -> Result<Vec<CommandRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ROW_COLUMNS} FROM commands ORDER BY rowid"
    ))?;
    let rows = stmt.query_map([], map_row)?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Rows with a summary whose embedding is missing or was computed for
/// different content
pub fn get_rows_missing_embedding(conn: &Connection) -> Result<Vec<CommandRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ROW_COLUMNS} FROM commands
         WHERE summary IS NOT NULL AND summary <> ''
           AND (embedding IS NULL OR embedded_hash IS NULL OR embedded_hash <> content_hash)
         ORDER BY rowid"
    ))?;
    let rows = stmt.query_map([], map_row)?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

pub fn stats(conn: &Connection) -> Result<StoreStats> {
    let (commands, summarised, embedded): (i64, i64, i64) = conn.query_row(
        "SELECT COUNT(*),
                COUNT(CASE WHEN summary IS NOT NULL AND summary <> '' THEN 1 END),
                COUNT(embedding)
         FROM commands",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;
    Ok(StoreStats {
        commands: commands as usize,
        summarised: summarised as usize,
        embedded: embedded as usize,
    })
}

/// Converts f32 slice to little-endian bytes for storage
pub(crate) fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Converts little-endian bytes back to f32 slice
pub(crate) fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
