use crate::AggregateView;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Score at or above which a skill becomes an optimization candidate
pub const OPTIMIZE_THRESHOLD: u8 = 50;
/// Score at or above which a skill is worth watching
pub const MONITOR_THRESHOLD: u8 = 25;

/// Three-way verdict derived from a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Optimize,
    Monitor,
    Ok,
}

impl Recommendation {
    /// Monotone mapping: `optimize` iff score >= 50, `monitor` iff 25 <= score < 50
    pub fn from_score(score: u8) -> Self {
        if score >= OPTIMIZE_THRESHOLD {
            Self::Optimize
        } else if score >= MONITOR_THRESHOLD {
            Self::Monitor
        } else {
            Self::Ok
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Optimize => "optimize",
            Self::Monitor => "monitor",
            Self::Ok => "ok",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The scorer's verdict for one skill at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub skill_id: String,
    pub aggregate: AggregateView,
    /// 0-100, higher means more wasteful
    pub score: u8,
    pub reasons: Vec<String>,
    pub recommendation: Recommendation,
}

impl CandidateScore {
    /// Build a score; the recommendation always follows from `score`
    pub fn new(aggregate: AggregateView, score: u8, reasons: Vec<String>) -> Self {
        let score = score.min(100);
        Self {
            skill_id: aggregate.skill_id.clone(),
            aggregate,
            score,
            reasons,
            recommendation: Recommendation::from_score(score),
        }
    }

    pub fn is_candidate(&self) -> bool {
        self.recommendation == Recommendation::Optimize
    }
}
