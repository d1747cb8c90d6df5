use sha2::{Digest, Sha256};
use std::time::Duration;

use super::{PipelineReport, Progress};
use crate::config::Config;
use crate::db::Store;
use crate::discovery::{CommandItem, ContentSource};
use crate::error::{Error, Result};
use crate::summariser::{self, ModelSelector};

#[derive(Debug, Clone)]
pub struct SummaryOptions {
    pub max_content_chars: usize,
    pub max_consecutive_failures: usize,
    pub model_select_attempts: u32,
    pub model_select_delay: Duration,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SummaryOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_content_chars: config.max_content_chars,
            max_consecutive_failures: config.max_consecutive_failures,
            model_select_attempts: config.model_select_attempts,
            model_select_delay: config.model_select_delay(),
        }
    }
}

/// SHA-256 of a command's content, hex encoded
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Summarises every command that is new or whose content changed.
///
/// All commands are registered before a model is looked up, so they exist
/// in the store even when summarisation cannot run.
pub async fn run_summary_pipeline(
    store: &Store,
    selector: &dyn ModelSelector,
    source: &dyn ContentSource,
    commands: &[CommandItem],
    options: &SummaryOptions,
    mut on_progress: impl FnMut(Progress),
) -> Result<PipelineReport> {
    let mut report = PipelineReport::default();

    let mut readable = Vec::with_capacity(commands.len());
    for item in commands {
        match source.read_content(item).await {
            Ok(content) => {
                let hash = content_hash(&content);
                store.register_command(&item.id, &hash)?;
                readable.push((item, content, hash));
            }
            Err(e) => {
                log::warn!("Could not read content for {}: {}", item.id, e);
                store.register_command(&item.id, "")?;
                report.failed += 1;
            }
        }
    }

    let model = summariser::select_model(
        selector,
        options.model_select_attempts,
        options.model_select_delay,
    )
    .await?;

    let mut pending = Vec::new();
    for (item, content, hash) in readable {
        let needs_summary = match store.get_row(&item.id)? {
            None => true,
            Some(row) => {
                row.summary.as_deref().map_or(true, |s| s.trim().is_empty())
                    || row.content_hash != hash
            }
        };
        if needs_summary {
            pending.push((item, content, hash));
        }
    }

    log::info!(
        "{} of {} commands need a summary",
        pending.len(),
        commands.len()
    );

    let total = pending.len();
    let mut consecutive_failures = 0;
    for (done, (item, content, hash)) in pending.into_iter().enumerate() {
        let result = summariser::summarise(
            model.as_ref(),
            &item.label,
            &item.command_type,
            &item.command,
            &content,
            options.max_content_chars,
        )
        .await;

        match result {
            Ok(summary) => {
                store.upsert_summary(
                    &item.id,
                    &hash,
                    &summary.summary,
                    summary.security_warning.as_deref(),
                )?;
                report.succeeded += 1;
                consecutive_failures = 0;
            }
            Err(e) => {
                log::warn!("Summary failed for {}: {}", item.id, e);
                report.failed += 1;
                consecutive_failures += 1;
            }
        }

        on_progress(Progress {
            done: done + 1,
            total,
            succeeded: report.succeeded,
            failed: report.failed,
        });

        if consecutive_failures >= options.max_consecutive_failures.max(1) {
            log::warn!(
                "Stopping after {} consecutive summary failures",
                consecutive_failures
            );
            report.aborted = done + 1 < total;
            break;
        }
    }

    if report.succeeded == 0 && report.failed > 0 {
        return Err(Error::AllFailed {
            what: "summaries",
            attempted: report.failed,
        });
    }

    Ok(report)
}
