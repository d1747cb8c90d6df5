use super::{PipelineReport, Progress};
use crate::db::Store;
use crate::embedder::Embedder;
use crate::error::{Error, Result};

/// Embeds every stored summary whose embedding is missing or stale
pub async fn run_embedding_pipeline(
    store: &Store,
    embedder: &dyn Embedder,
    mut on_progress: impl FnMut(Progress),
) -> Result<PipelineReport> {
    let rows = store.get_rows_missing_embedding()?;
    let total = rows.len();
    let mut report = PipelineReport::default();

    if total == 0 {
        log::debug!("All summaries already embedded");
        return Ok(report);
    }
    log::info!("{} summaries need an embedding", total);

    for (done, row) in rows.into_iter().enumerate() {
        let Some(summary) = row.summary.as_deref() else {
            continue;
        };

        match embedder.embed(summary).await {
            Ok(vector) => {
                store.upsert_embedding_for(&row.command_id, &row.content_hash, &vector)?;
                report.succeeded += 1;
            }
            Err(e) => {
                log::warn!("Embedding failed for {}: {}", row.command_id, e);
                report.failed += 1;
            }
        }

        on_progress(Progress {
            done: done + 1,
            total,
            succeeded: report.succeeded,
            failed: report.failed,
        });
    }

    if report.succeeded == 0 && report.failed > 0 {
        return Err(Error::AllFailed {
            what: "embeddings",
            attempted: report.failed,
        });
    }

    Ok(report)
}
