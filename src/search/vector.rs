/// A command and its similarity to the query
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ScoredCandidate {
    pub id: String,
    pub score: f64,
}

/// Computes cosine similarity between two vectors.
/// Exactly 0 when either vector has zero magnitude or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        (dot / denom).clamp(-1.0, 1.0)
    }
}

/// Scores candidates against `query`, keeps those with `score >= threshold`,
/// and returns at most `top_k` of them, best first. Equal scores keep their
/// input order. Candidates without a vector, or whose dimension differs from
/// the query, are skipped.
pub fn rank<'a, I>(query: &[f32], candidates: I, top_k: usize, threshold: f64) -> Vec<ScoredCandidate>
where
    I: IntoIterator<Item = (&'a str, Option<&'a [f32]>)>,
{
    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .filter_map(|(id, vector)| {
            let vector = vector?;
            if vector.len() != query.len() {
                log::warn!(
                    "Skipping {}: embedding has {} dimensions, query has {}",
                    id,
                    vector.len(),
                    query.len()
                );
                return None;
            }
            Some(ScoredCandidate {
                id: id.to_string(),
                score: cosine_similarity(query, vector),
            })
        })
        .filter(|c| c.score >= threshold)
        .collect();

    // sort_by is stable, which gives the input-order tie-break
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(top_k);
    scored
}
