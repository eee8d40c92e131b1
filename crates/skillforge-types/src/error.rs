//! Error types shared across the SkillForge crates

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// SkillForge errors
#[derive(Debug, Error)]
pub enum ForgeError {
    /// Ledger I/O failed. Never recovered locally.
    #[error("Storage failure: {0}")]
    StorageFailure(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A skill definition or artifact could not be read
    #[error("Content unavailable at {path:?}: {source}")]
    ContentUnavailable {
        /// Path that could not be read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A stored record could not be parsed back
    #[error("Malformed record in '{table}' (seq {seq}): {reason}")]
    MalformedRecord {
        /// Table the record lives in
        table: &'static str,
        /// Insertion sequence number
        seq: i64,
        /// Parse failure detail
        reason: String,
    },

    /// The execution collaborator did not answer in time
    #[error("Execution of '{skill_id}' timed out after {timeout:?}")]
    ExecutionTimeout {
        /// Skill being executed
        skill_id: String,
        /// Configured timeout
        timeout: Duration,
    },

    /// Skill is not known to the registry
    #[error("Unknown skill '{0}'")]
    UnknownSkill(String),

    /// An artifact could not be written
    #[error("Failed to write artifact at {path:?}: {source}")]
    ArtifactWrite {
        /// Path that could not be written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A built-in text pattern failed to compile
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// Pattern source
        pattern: &'static str,
        /// Compiler message
        reason: String,
    },
}

impl ForgeError {
    /// Wrap any storage-layer error
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::StorageFailure(Box::new(err))
    }

    /// Build a `ContentUnavailable` error for `path`
    pub fn content_unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ContentUnavailable {
            path: path.into(),
            source,
        }
    }

    /// Build an `ArtifactWrite` error for `path`
    pub fn artifact_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ArtifactWrite {
            path: path.into(),
            source,
        }
    }

    /// Whether this error only affects a single skill's sub-pipeline
    pub fn is_skill_local(&self) -> bool {
        !matches!(self, Self::StorageFailure(_) | Self::InvalidPattern { .. })
    }
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, ForgeError>;
