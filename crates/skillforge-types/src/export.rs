use crate::{AggregateView, LifecycleEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of recent events carried by an export
pub const EXPORT_EVENT_LIMIT: usize = 100;

/// Headline figures of a dashboard export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub skills_tracked: usize,
    pub total_runs: u64,
    pub avg_runtime_ms: f64,
    /// Mean estimated token savings (%) over optimized skills, 0 when none
    pub avg_token_savings_pct: f64,
    /// Malformed ledger records skipped while reading
    pub skipped_records: u64,
}

/// Read-only snapshot for dashboards and reports; regenerated on demand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardExport {
    pub timestamp: DateTime<Utc>,
    pub summary: ExportSummary,
    pub skills: Vec<AggregateView>,
    /// Most recent events, newest first
    pub events: Vec<LifecycleEvent>,
}
