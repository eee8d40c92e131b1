//! Baseline profiling
//!
//! Runs a skill's definition through the executor and appends one sample
//! per iteration. A failed or timed-out iteration is data, not an error.

use skillforge_persistence::Ledger;
use skillforge_skills::Skill;
use skillforge_types::{AggregateView, ForgeModule, LifecycleEvent, Result, RunSample};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::estimator::{CharRatioEstimator, TokenEstimator};
use crate::executor::{execute_bounded, ExecutionReport, SkillExecutor, DEFAULT_EXECUTION_TIMEOUT};

/// Collects run samples for skills
#[derive(Clone)]
pub struct Profiler {
    ledger: Ledger,
    executor: Arc<dyn SkillExecutor>,
    estimator: Arc<dyn TokenEstimator>,
    timeout: Duration,
}

impl Profiler {
    pub fn new(ledger: Ledger, executor: Arc<dyn SkillExecutor>) -> Self {
        Self {
            ledger,
            executor,
            estimator: Arc::new(CharRatioEstimator),
            timeout: DEFAULT_EXECUTION_TIMEOUT,
        }
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Profile a skill for `iterations` runs and return its fresh aggregate.
    ///
    /// Fails with `ContentUnavailable` before touching the ledger when the
    /// definition cannot be read.
    pub async fn profile_skill(&self, skill: &Skill, iterations: usize) -> Result<AggregateView> {
        let content = skill.read_content()?;
        self.ledger
            .register_skill(&skill.id, &skill.path.to_string_lossy())
            .await?;

        let tokens_in = self.estimator.estimate(&content);
        let mut failures = 0usize;

        for iteration in 0..iterations {
            let outcome =
                execute_bounded(self.executor.as_ref(), &skill.id, &content, self.timeout).await;
            let report = match outcome {
                Ok(report) => report,
                Err(e) => {
                    warn!("{}", e);
                    ExecutionReport::timed_out(self.timeout)
                }
            };

            if !report.success {
                failures += 1;
            }

            let sample = RunSample::new(
                &skill.id,
                report.elapsed,
                tokens_in,
                report.output_tokens,
                report.success,
            );
            self.ledger.record_run(&sample).await?;

            debug!(
                "{} iteration {}: {:?}, {}+{} tokens, {}",
                skill.id,
                iteration + 1,
                report.elapsed,
                tokens_in,
                report.output_tokens,
                if report.success { "ok" } else { "fail" }
            );
        }

        self.ledger
            .record_event(&LifecycleEvent::new(
                ForgeModule::Profiler,
                "batch-complete",
                &skill.id,
                format!("Profiled {iterations} iterations ({failures} failed)"),
            ))
            .await?;

        let aggregate = self.ledger.aggregate(&skill.id).await?;
        info!(
            "Profiled {}: {} runs, {:.0}ms avg",
            skill.id, aggregate.total_runs, aggregate.mean_elapsed_ms
        );
        Ok(aggregate)
    }
}
