use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Version tag carried by samples when none is given
pub const DEFAULT_VERSION: &str = "v1";

/// One observed execution of a skill version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSample {
    pub skill_id: String,
    #[serde(rename = "elapsed_ms", with = "crate::duration_ms")]
    pub elapsed: Duration,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl RunSample {
    pub fn new(
        skill_id: impl Into<String>,
        elapsed: Duration,
        tokens_in: u64,
        tokens_out: u64,
        success: bool,
    ) -> Self {
        Self {
            skill_id: skill_id.into(),
            elapsed,
            tokens_in,
            tokens_out,
            success,
            timestamp: Utc::now(),
            version: DEFAULT_VERSION.to_string(),
        }
    }

}

/// Summary over the most recent window of a skill's samples.
///
/// Recomputed on every read; an empty window yields all zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateView {
    pub skill_id: String,
    pub mean_elapsed_ms: f64,
    pub mean_tokens_in: f64,
    pub mean_tokens_out: f64,
    pub total_runs: u64,
    pub failure_rate: f64,
    pub p95_elapsed_ms: f64,
}

impl AggregateView {
    pub fn empty(skill_id: impl Into<String>) -> Self {
        Self {
            skill_id: skill_id.into(),
            mean_elapsed_ms: 0.0,
            mean_tokens_in: 0.0,
            mean_tokens_out: 0.0,
            total_runs: 0,
            failure_rate: 0.0,
            p95_elapsed_ms: 0.0,
        }
    }

    /// Mean tokens in plus mean tokens out
    pub fn mean_total_tokens(&self) -> f64 {
        self.mean_tokens_in + self.mean_tokens_out
    }

    /// No samples in the window
    pub fn is_empty(&self) -> bool {
        self.total_runs == 0
    }
}
