pub mod embedding;
pub mod summary;

/// Reported after every processed item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Outcome of a sweep in which at least one item succeeded, or nothing
/// needed doing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct PipelineReport {
    pub succeeded: usize,
    pub failed: usize,
    /// The sweep stopped early after too many consecutive failures
    pub aborted: bool,
}
