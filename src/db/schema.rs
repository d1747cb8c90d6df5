use rusqlite::Connection;

use crate::error::Result;

/// Creates all tables for the cmdseek database
pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- One row per discovered command
        CREATE TABLE IF NOT EXISTS commands (
            command_id TEXT PRIMARY KEY,
            content_hash TEXT NOT NULL DEFAULT '',
            summary TEXT,
            security_warning TEXT,
            embedding BLOB,
            embedded_hash TEXT,
            last_updated TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tags (
            tag_id INTEGER PRIMARY KEY AUTOINCREMENT,
            tag_name TEXT NOT NULL UNIQUE
        );

        -- Ordered many-to-many relation between commands and tags
        CREATE TABLE IF NOT EXISTS command_tags (
            command_id TEXT NOT NULL,
            tag_id INTEGER NOT NULL REFERENCES tags(tag_id) ON DELETE CASCADE,
            display_order INTEGER NOT NULL DEFAULT 0,
            UNIQUE (command_id, tag_id)
        );

        CREATE INDEX IF NOT EXISTS idx_command_tags_tag
            ON command_tags(tag_id, display_order);
        ",
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        create_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('commands', 'tags', 'command_tags')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }
}
