use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Module that originated a lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForgeModule {
    Profiler,
    Analyzer,
    Optimizer,
    Validator,
    Forge,
}

impl ForgeModule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profiler => "profiler",
            Self::Analyzer => "analyzer",
            Self::Optimizer => "optimizer",
            Self::Validator => "validator",
            Self::Forge => "forge",
        }
    }
}

impl fmt::Display for ForgeModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForgeModule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "profiler" => Ok(Self::Profiler),
            "analyzer" => Ok(Self::Analyzer),
            "optimizer" => Ok(Self::Optimizer),
            "validator" => Ok(Self::Validator),
            "forge" => Ok(Self::Forge),
            other => Err(format!("unknown module '{other}'")),
        }
    }
}

/// Immutable audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub timestamp: DateTime<Utc>,
    pub module: ForgeModule,
    pub action: String,
    pub skill_id: String,
    pub details: String,
}

impl LifecycleEvent {
    pub fn new(
        module: ForgeModule,
        action: impl Into<String>,
        skill_id: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            module,
            action: action.into(),
            skill_id: skill_id.into(),
            details: details.into(),
        }
    }
}
