//! SkillForge engine
//!
//! The stages of the self-optimization loop: profile skills into the ledger,
//! score them, rewrite flagged ones, gate the rewrite with an A/B comparison
//! and promote or reject it. [`Forge`] runs them end to end.

pub mod estimator;
pub mod executor;
pub mod optimizer;
mod pattern;
pub mod pipeline;
pub mod profiler;
pub mod scorer;
pub mod validator;

pub use estimator::{CharRatioEstimator, TokenEstimator};
pub use executor::{
    execute_bounded, ExecutionReport, SimulatedExecutor, SkillExecutor, DEFAULT_EXECUTION_TIMEOUT,
};
pub use optimizer::{ArtifactRewriter, HeuristicRewriter, Optimizer, RewritePlan};
pub use pipeline::{Forge, ForgeOptions, ForgeReport, SkillOutcome, SkillReport};
pub use profiler::Profiler;
pub use scorer::{rank, score, Analyzer};
pub use validator::{similarity, ValidationGate, DEFAULT_VALIDATION_ITERATIONS};
