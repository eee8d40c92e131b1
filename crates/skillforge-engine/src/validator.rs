//! A/B validation gate
//!
//! Replays the original and the optimized artifact through the executor and
//! decides whether the rewrite may be promoted. Only similarity and token
//! savings decide; speed is reported alongside.

use regex::Regex;
use skillforge_persistence::Ledger;
use skillforge_skills::Skill;
use skillforge_types::{as_millis_f64, ForgeModule, LifecycleEvent, Result, ValidationVerdict};
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info};

use crate::estimator::{CharRatioEstimator, TokenEstimator};
use crate::executor::{execute_bounded, SkillExecutor, DEFAULT_EXECUTION_TIMEOUT};
use crate::pattern::cached;

/// Rounds per validation when nothing else is configured
pub const DEFAULT_VALIDATION_ITERATIONS: usize = 3;

/// Compares an artifact against its rewrite
#[derive(Clone)]
pub struct ValidationGate {
    ledger: Ledger,
    executor: Arc<dyn SkillExecutor>,
    estimator: Arc<dyn TokenEstimator>,
    timeout: Duration,
}

impl ValidationGate {
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

    /// Run `iterations` rounds of original-then-optimized and judge the pair.
    ///
    /// Always appends a `validator` event. A run exceeding the timeout fails
    /// with `ExecutionTimeout` and records nothing.
    pub async fn validate(
        &self,
        skill_id: &str,
        original: &str,
        optimized: &str,
        iterations: usize,
    ) -> Result<ValidationVerdict> {
        let mut original_timings_ms = Vec::with_capacity(iterations);
        let mut optimized_timings_ms = Vec::with_capacity(iterations);

        for round in 0..iterations {
            let before =
                execute_bounded(self.executor.as_ref(), skill_id, original, self.timeout).await?;
            let after =
                execute_bounded(self.executor.as_ref(), skill_id, optimized, self.timeout).await?;

            debug!(
                "{} round {}: original {:?}, optimized {:?}",
                skill_id,
                round + 1,
                before.elapsed,
                after.elapsed
            );
            original_timings_ms.push(as_millis_f64(before.elapsed));
            optimized_timings_ms.push(as_millis_f64(after.elapsed));
        }

        let speed_improvement =
            relative_reduction(mean(&original_timings_ms), mean(&optimized_timings_ms));
        let token_savings = relative_reduction(
            self.estimator.estimate(original) as f64,
            self.estimator.estimate(optimized) as f64,
        );
        let similarity = similarity(original, optimized)?;
        let passed = ValidationVerdict::passes(similarity, token_savings);

        let verdict = ValidationVerdict {
            skill_id: skill_id.to_string(),
            target_version: self.ledger.next_version(skill_id).await?,
            passed,
            original_timings_ms,
            optimized_timings_ms,
            similarity,
            speed_improvement,
            token_savings,
        };

        self.ledger
            .record_event(&LifecycleEvent::new(
                ForgeModule::Validator,
                if passed { "passed" } else { "failed" },
                skill_id,
                verdict.summary(),
            ))
            .await?;

        info!(
            "Validation {} for {}: {}",
            if passed { "passed" } else { "failed" },
            skill_id,
            verdict.summary()
        );
        Ok(verdict)
    }

    /// Validate a skill's definition against its `SKILL.optimized.md`
    pub async fn validate_skill(
        &self,
        skill: &Skill,
        iterations: usize,
    ) -> Result<ValidationVerdict> {
        let original = skill.read_content()?;
        let optimized = skill.read_optimized()?;
        self.validate(&skill.id, &original, &optimized, iterations).await
    }
}

/// `(before - after) / before`, or 0 when there is no baseline
fn relative_reduction(before: f64, after: f64) -> f64 {
    if before == 0.0 {
        0.0
    } else {
        (before - after) / before
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn word_set(words: &Regex, text: &str) -> HashSet<String> {
    words
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Jaccard similarity of the case-folded word sets; 0 when both are empty
pub fn similarity(a: &str, b: &str) -> Result<f64> {
    static WORDS: OnceLock<Regex> = OnceLock::new();
    let words = cached(&WORDS, r"\w+")?;

    let left = word_set(words, a);
    let right = word_set(words, b);
    let union = left.union(&right).count();
    if union == 0 {
        return Ok(0.0);
    }
    Ok(left.intersection(&right).count() as f64 / union as f64)
}
