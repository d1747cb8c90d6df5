use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::config;
use crate::db::Store;
use crate::error::{Error, Result};

/// One entry of the legacy file, keyed by command id
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyRecord {
    #[serde(default)]
    content_hash: String,
    #[serde(default)]
    summary: Option<String>,
    /// RFC 3339 string or milliseconds since the epoch
    #[serde(default)]
    last_updated: Option<serde_json::Value>,
}

impl LegacyRecord {
    fn last_updated(&self) -> Option<String> {
        match self.last_updated.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => n
                .as_i64()
                .and_then(chrono::DateTime::from_timestamp_millis)
                .map(|dt| dt.to_rfc3339()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Records found in the legacy file
    pub found: usize,
    /// Records that changed the store
    pub imported: usize,
}

/// Imports `<root>/.cmdseek/summaries.json` into the store and removes it.
///
/// A missing file is a successful no-op. Import is keyed by command id and
/// never overwrites an existing summary, so running it again is harmless.
pub async fn migrate_if_needed(store: &Store, root: &Path) -> Result<MigrationReport> {
    let path = config::legacy_path(root);
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(MigrationReport::default());
        }
        Err(e) => {
            return Err(Error::Io(format!("failed to read {}: {}", path.display(), e)));
        }
    };

    let records: BTreeMap<String, LegacyRecord> = serde_json::from_str(&content)
        .map_err(|e| Error::Parse(format!("invalid legacy file {}: {}", path.display(), e)))?;

    let mut report = MigrationReport {
        found: records.len(),
        imported: 0,
    };

    let fallback_time = chrono::Utc::now().to_rfc3339();
    for (command_id, record) in &records {
        let last_updated = record
            .last_updated()
            .unwrap_or_else(|| fallback_time.clone());
        if store.import_legacy_record(
            command_id,
            &record.content_hash,
            record.summary.as_deref(),
            &last_updated,
        )? {
            report.imported += 1;
        }
    }

    log::info!(
        "Migrated {} of {} legacy records from {:?}",
        report.imported,
        report.found,
        path
    );

    if let Err(e) = tokio::fs::remove_file(&path).await {
        log::warn!("Could not remove legacy file {:?}: {}", path, e);
    }

    Ok(report)
}
