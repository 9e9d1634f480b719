//! Metrics describing one archive-to-archive run.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-token-file snapshot captured while the pipeline processes a member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileMetrics {
    /// Source archive member name.
    pub name: String,
    /// Token lists decoded during the training pass.
    pub token_lists: usize,
    /// Adjacent pairs merged by the phrase model during the training pass.
    pub phrase_merges: usize,
    /// Vocabulary size of the trained model after `min_count` filtering.
    pub vocab_size: usize,
    /// Wall time spent on both passes and training for this member.
    pub elapsed: Duration,
}

/// Aggregate metrics produced by a completed run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunMetrics {
    /// Number of model files packed into the result archive.
    pub models: usize,
    /// Total duration of the run.
    pub total_duration: Duration,
    /// Per-member snapshots in processing order.
    pub files: Vec<FileMetrics>,
}

impl RunMetrics {
    /// Creates an empty metrics container with pre-allocated capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            models: 0,
            total_duration: Duration::ZERO,
            files: Vec::with_capacity(capacity),
        }
    }
}
