//! SkillForge Types - Core types for the SkillForge pipeline
//!
//! This module defines the data model shared by the ledger, the scorer,
//! the optimizer, the validation gate and the CLI.

pub mod error;
pub mod events;
pub mod export;
pub mod outcome;
pub mod registry;
pub mod sample;
pub mod score;

pub use error::{ForgeError, Result};
pub use events::{ForgeModule, LifecycleEvent};
pub use export::{DashboardExport, ExportSummary, EXPORT_EVENT_LIMIT};
pub use outcome::{OptimizationOutcome, ValidationVerdict};
pub use registry::{next_version, OptimizationState, SkillRecord};
pub use sample::{AggregateView, RunSample, DEFAULT_VERSION};
pub use score::{CandidateScore, Recommendation};

/// Serde helpers for `Duration` values stored as fractional milliseconds
pub mod duration_ms {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64() * 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = f64::deserialize(deserializer)?;
        if !millis.is_finite() || millis < 0.0 {
            return Err(D::Error::custom(format!("invalid duration: {millis}ms")));
        }
        Ok(Duration::from_secs_f64(millis / 1000.0))
    }
}

/// Convert a duration to fractional milliseconds
pub fn as_millis_f64(duration: std::time::Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
