//! Skill execution capability
//!
//! Running a skill is delegated to an injected [`SkillExecutor`]. The
//! default [`SimulatedExecutor`] sleeps for a random latency; production
//! harnesses and test fakes plug in behind the same trait. Every call made by
//! the pipeline goes through [`execute_bounded`].

use async_trait::async_trait;
use rand::Rng;
use skillforge_types::{ForgeError, Result};
use std::ops::RangeInclusive;
use std::time::{Duration, Instant};

use crate::estimator::{CharRatioEstimator, TokenEstimator};

/// Default bound on a single execution
pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(30);

/// What one execution of a skill cost
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionReport {
    pub elapsed: Duration,
    pub output_tokens: u64,
    pub success: bool,
}

impl ExecutionReport {
    /// Report for a run that hit the timeout
    pub fn timed_out(timeout: Duration) -> Self {
        Self {
            elapsed: timeout,
            output_tokens: 0,
            success: false,
        }
    }
}

/// Runs skill content and reports its cost
#[async_trait]
pub trait SkillExecutor: Send + Sync {
    async fn execute(&self, content: &str) -> ExecutionReport;
}

/// Execute with an explicit timeout
pub async fn execute_bounded(
    executor: &dyn SkillExecutor,
    skill_id: &str,
    content: &str,
    timeout: Duration,
) -> Result<ExecutionReport> {
    tokio::time::timeout(timeout, executor.execute(content))
        .await
        .map_err(|_| ForgeError::ExecutionTimeout {
            skill_id: skill_id.to_string(),
            timeout,
        })
}

/// Stand-in for a model call: random latency, output sized from the input,
/// occasional failures
#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
    latency_ms: RangeInclusive<u64>,
    failure_rate: f64,
    estimator: CharRatioEstimator,
}

impl SimulatedExecutor {
    pub fn new(min_latency_ms: u64, max_latency_ms: u64, failure_rate: f64) -> Self {
        let (low, high) = if min_latency_ms <= max_latency_ms {
            (min_latency_ms, max_latency_ms)
        } else {
            (max_latency_ms, min_latency_ms)
        };
        Self {
            latency_ms: low..=high,
            failure_rate: failure_rate.clamp(0.0, 1.0),
            estimator: CharRatioEstimator,
        }
    }

    /// Latency profile used when collecting baseline samples
    pub fn for_profiling() -> Self {
        Self::new(200, 1000, 0.05)
    }

    /// Faster profile used by the A/B gate
    pub fn for_validation() -> Self {
        Self::new(50, 250, 0.0)
    }
}

impl Default for SimulatedExecutor {
    fn default() -> Self {
        Self::for_profiling()
    }
}

#[async_trait]
impl SkillExecutor for SimulatedExecutor {
    async fn execute(&self, content: &str) -> ExecutionReport {
        let tokens_in = self.estimator.estimate(content);

        // ThreadRng is not Send; draw everything before suspending
        let (latency, output_ratio, success) = {
            let mut rng = rand::thread_rng();
            (
                Duration::from_millis(rng.gen_range(self.latency_ms.clone())),
                rng.gen_range(0.3..0.7),
                !rng.gen_bool(self.failure_rate),
            )
        };

        let start = Instant::now();
        tokio::time::sleep(latency).await;

        ExecutionReport {
            elapsed: start.elapsed(),
            output_tokens: (tokens_in as f64 * output_ratio) as u64,
            success,
        }
    }
}
