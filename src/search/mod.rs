pub mod vector;

use std::path::Path;

use crate::config::Config;
use crate::db::Store;
use crate::error::Result;
use crate::lifecycle::LifecycleManager;

pub use vector::{cosine_similarity, rank, ScoredCandidate};

#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    pub top_k: usize,
    pub threshold: f64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: 20,
            threshold: 0.3,
        }
    }
}

impl From<&Config> for SearchOptions {
    fn from(config: &Config) -> Self {
        Self {
            top_k: config.top_k,
            threshold: config.threshold,
        }
    }
}

/// A ranked command with its stored summary, for display
#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchHit {
    pub command_id: String,
    pub score: f64,
    pub summary: Option<String>,
    pub security_warning: Option<String>,
}

/// Semantic search over stored command summaries.
///
/// Errors from the store, the embedder or the query embedding are returned
/// as-is. There is no keyword fallback: a degraded search must look like a
/// failed one, not like a result.
pub async fn search(
    lifecycle: &LifecycleManager,
    root: &Path,
    query: &str,
    options: SearchOptions,
) -> Result<Vec<ScoredCandidate>> {
    let store = lifecycle.init_store(root).await?;
    let rows = store.get_all_rows()?;
    if rows.is_empty() {
        log::debug!("Store is empty, nothing to search");
        return Ok(Vec::new());
    }

    let embedder = lifecycle.get_or_create_embedder(root).await?;
    let query_embedding = embedder.embed(query).await?;

    let candidates = rows
        .iter()
        .map(|row| (row.command_id.as_str(), row.embedding.as_deref()));
    let ranked = vector::rank(&query_embedding, candidates, options.top_k, options.threshold);

    log::debug!(
        "Query {:?} matched {} of {} commands",
        query,
        ranked.len(),
        rows.len()
    );
    Ok(ranked)
}

/// Attaches stored summaries to ranked candidates, dropping any whose row
/// has disappeared
pub fn describe_hits(store: &Store, ranked: &[ScoredCandidate]) -> Result<Vec<SearchHit>> {
    let mut hits = Vec::with_capacity(ranked.len());
    for candidate in ranked {
        if let Some(row) = store.get_row(&candidate.id)? {
            hits.push(SearchHit {
                command_id: candidate.id.clone(),
                score: candidate.score,
                summary: row.summary,
                security_warning: row.security_warning,
            });
        }
    }
    Ok(hits)
}
