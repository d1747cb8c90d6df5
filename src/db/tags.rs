use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};

fn tag_id(conn: &Connection, tag_name: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT tag_id FROM tags WHERE tag_name = ?1",
            params![tag_name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

fn ensure_tag(conn: &Connection, tag_name: &str) -> Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO tags (tag_name) VALUES (?1)",
        params![tag_name],
    )?;
    tag_id(conn, tag_name)?.ok_or_else(|| Error::Storage(format!("tag {tag_name} vanished")))
}

/// Appends a command to the end of a tag. Returns false if it was already tagged.
pub fn add_tag(conn: &Connection, command_id: &str, tag_name: &str) -> Result<bool> {
    let tag_id = ensure_tag(conn, tag_name)?;
    let next_order: i64 = conn.query_row(
        "SELECT COALESCE(MAX(display_order), -1) + 1 FROM command_tags WHERE tag_id = ?1",
        params![tag_id],
        |row| row.get(0),
    )?;

    let inserted = conn.execute(
        "INSERT OR IGNORE INTO command_tags (command_id, tag_id, display_order)
         VALUES (?1, ?2, ?3)",
        params![command_id, tag_id, next_order],
    )?;
    Ok(inserted > 0)
}

/// Removes a command from a tag. Returns false if it was not tagged.
pub fn remove_tag(conn: &Connection, command_id: &str, tag_name: &str) -> Result<bool> {
    let Some(tag_id) = tag_id(conn, tag_name)? else {
        return Ok(false);
    };
    let removed = conn.execute(
        "DELETE FROM command_tags WHERE command_id = ?1 AND tag_id = ?2",
        params![command_id, tag_id],
    )?;
    Ok(removed > 0)
}

/// Command IDs carrying a tag, in display order
pub fn get_command_ids_by_tag(conn: &Connection, tag_name: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT ct.command_id
         FROM command_tags ct
         JOIN tags t ON t.tag_id = ct.tag_id
         WHERE t.tag_name = ?1
         ORDER BY ct.display_order, ct.rowid",
    )?;
    let rows = stmt.query_map(params![tag_name], |row| row.get(0))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

/// Tag names attached to a command, alphabetically
pub fn get_tags_for_command(conn: &Connection, command_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT t.tag_name
         FROM command_tags ct
         JOIN tags t ON t.tag_id = ct.tag_id
         WHERE ct.command_id = ?1
         ORDER BY t.tag_name",
    )?;
    let rows = stmt.query_map(params![command_id], |row| row.get(0))?;

    let mut tags = Vec::new();
    for row in rows {
        tags.push(row?);
    }
    Ok(tags)
}

/// All tag names that have at least one command
pub fn list_tags(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT t.tag_name
         FROM tags t
         JOIN command_tags ct ON ct.tag_id = t.tag_id
         ORDER BY t.tag_name",
    )?;
    let rows = stmt.query_map([], |row| row.get(0))?;

    let mut tags = Vec::new();
    for row in rows {
        tags.push(row?);
    }
    Ok(tags)
}

/// Moves a command to `new_index` within a tag and renumbers the tag densely.
/// Indices past the end place the command last.
pub fn move_in_tag(
    conn: &Connection,
    command_id: &str,
    tag_name: &str,
    new_index: usize,
) -> Result<()> {
    let mut ids = get_command_ids_by_tag(conn, tag_name)?;
    let Some(current) = ids.iter().position(|id| id == command_id) else {
        return Err(Error::NotFound(format!("{command_id} in tag {tag_name}")));
    };
    let tag_id = tag_id(conn, tag_name)?
        .ok_or_else(|| Error::NotFound(format!("tag {tag_name}")))?;

    let moved = ids.remove(current);
    ids.insert(new_index.min(ids.len()), moved);

    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "UPDATE command_tags SET display_order = ?1 WHERE command_id = ?2 AND tag_id = ?3",
        )?;
        for (order, id) in ids.iter().enumerate() {
            stmt.execute(params![order as i64, id, tag_id])?;
        }
    }
    tx.commit()?;

    Ok(())
}
