use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a skill stands in its optimization lifecycle.
///
/// `Pending -> Optimized -> {Promoted, Rejected}`. A new optimization attempt
/// moves a terminal skill back to `Optimized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationState {
    Pending,
    Optimized,
    Promoted,
    Rejected,
}

impl OptimizationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Optimized => "optimized",
            Self::Promoted => "promoted",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for OptimizationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "optimized" => Ok(Self::Optimized),
            "promoted" => Ok(Self::Promoted),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown optimization state '{other}'")),
        }
    }
}

/// Registry row for a skill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillRecord {
    pub skill_id: String,
    /// Skill directory as first registered
    pub locator: String,
    pub current_version: String,
    pub state: OptimizationState,
    /// Estimated savings percentage of the last optimization
    pub token_savings_pct: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

/// Next version tag after `current` ("v1" -> "v2"). Unparseable tags restart at "v2".
pub fn next_version(current: &str) -> String {
    current
        .strip_prefix('v')
        .and_then(|n| n.parse::<u32>().ok())
        .map(|n| format!("v{}", n.saturating_add(1)))
        .unwrap_or_else(|| "v2".to_string())
}
