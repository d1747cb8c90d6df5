use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// A runnable command as handed over by discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandItem {
    pub id: String,
    pub label: String,
    /// Tool family, e.g. `npm`, `shell`, `make`
    #[serde(rename = "type")]
    pub command_type: String,
    pub command: String,
    pub file_path: PathBuf,
}

impl CommandItem {
    /// Builds an item whose id is derived from type, path and name
    pub fn new(command_type: &str, file_path: &Path, label: &str, command: &str) -> Self {
        Self {
            id: command_id(command_type, file_path, label),
            label: label.to_string(),
            command_type: command_type.to_string(),
            command: command.to_string(),
            file_path: file_path.to_path_buf(),
        }
    }
}

/// Stable identifier for a command: `type:path:name`
pub fn command_id(command_type: &str, file_path: &Path, name: &str) -> String {
    format!("{}:{}:{}", command_type, file_path.display(), name)
}

/// Supplies the script or definition text behind a command.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn read_content(&self, item: &CommandItem) -> Result<String>;
}

/// Reads the command's source file from disk
pub struct FileContentSource;

#[async_trait]
impl ContentSource for FileContentSource {
    async fn read_content(&self, item: &CommandItem) -> Result<String> {
        tokio::fs::read_to_string(&item.file_path)
            .await
            .map_err(|e| Error::Io(format!("failed to read {}: {}", item.file_path.display(), e)))
    }
}

/// Loads a JSON array of commands. Entries without an `id` get one derived
/// from type, path and label.
pub fn load_manifest(path: &Path) -> Result<Vec<CommandItem>> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Entry {
        #[serde(default)]
        id: Option<String>,
        label: String,
        #[serde(rename = "type")]
        command_type: String,
        command: String,
        file_path: PathBuf,
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Io(format!("failed to read {}: {}", path.display(), e)))?;
    let entries: Vec<Entry> = serde_json::from_str(&content)?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(entries
        .into_iter()
        .map(|e| {
            let file_path = if e.file_path.is_relative() {
                base.join(&e.file_path)
            } else {
                e.file_path
            };
            let mut item = CommandItem::new(&e.command_type, &file_path, &e.label, &e.command);
            if let Some(id) = e.id {
                item.id = id;
            }
            item
        })
        .collect())
}
