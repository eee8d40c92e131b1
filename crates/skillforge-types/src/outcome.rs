use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Minimum similarity an optimized artifact must exceed to pass the gate
pub const MIN_SIMILARITY: f64 = 0.7;

/// Result of running the optimizer on a candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationOutcome {
    pub skill_id: String,
    pub original_path: PathBuf,
    pub optimized_path: PathBuf,
    pub optimized_content: String,
    pub changes: Vec<String>,
    /// Estimated tokens saved per run (negative if the rewrite grew)
    pub estimated_token_savings: i64,
    #[serde(rename = "estimated_time_savings_ms", with = "crate::duration_ms")]
    pub estimated_time_savings: Duration,
}

/// Result of the A/B validation gate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub skill_id: String,
    pub target_version: String,
    pub passed: bool,
    pub original_timings_ms: Vec<f64>,
    pub optimized_timings_ms: Vec<f64>,
    pub similarity: f64,
    /// Positive when the optimized version is faster
    pub speed_improvement: f64,
    /// Positive when the optimized version is smaller
    pub token_savings: f64,
}

impl ValidationVerdict {
    /// Promotion requires both similarity above 0.7 and strictly positive savings.
    /// Speed is reported but never part of the decision.
    pub fn passes(similarity: f64, token_savings: f64) -> bool {
        similarity > MIN_SIMILARITY && token_savings > 0.0
    }

    /// One-line summary of all three metrics
    pub fn summary(&self) -> String {
        format!(
            "Similarity: {:.0}%, Speed: {:.0}% faster, Tokens: {:.0}% saved",
            self.similarity * 100.0,
            self.speed_improvement * 100.0,
            self.token_savings * 100.0
        )
    }
}
