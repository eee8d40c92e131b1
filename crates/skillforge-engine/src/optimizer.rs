//! Artifact optimization
//!
//! The rewrite itself is pluggable ([`ArtifactRewriter`]); this module owns
//! the savings accounting, the artifact file and the audit trail.

use regex::Regex;
use skillforge_persistence::Ledger;
use skillforge_skills::Skill;
use skillforge_types::{CandidateScore, ForgeModule, LifecycleEvent, OptimizationOutcome, Result};
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info};

use crate::estimator::{CharRatioEstimator, TokenEstimator};
use crate::pattern::cached;

/// Share of the mean runtime an optimization is assumed to save
const TIME_SAVINGS_FRACTION: f64 = 0.15;
/// Bullets of 200 or more characters are shortened
const LONG_BULLET: &str = r"(?m)^(\s*[-*]\s+)(.{200,})";
/// Length a long bullet is cut back to before trimming the partial word
const SHORT_BULLET_CHARS: usize = 150;

/// Produces a rewritten artifact from the original text
pub trait ArtifactRewriter: Send + Sync {
    fn rewrite(&self, original: &str, score: &CandidateScore) -> Result<String>;
}

/// Rewrite plus its estimated savings, before anything is written
#[derive(Debug, Clone, PartialEq)]
pub struct RewritePlan {
    pub content: String,
    pub changes: Vec<String>,
    pub token_savings: i64,
    /// `token_savings` as a percentage of the original estimate
    pub savings_pct: f64,
    pub time_savings: Duration,
}

/// Rewrites candidate skills and records the result
#[derive(Clone)]
pub struct Optimizer {
    ledger: Ledger,
    rewriter: Arc<dyn ArtifactRewriter>,
    estimator: Arc<dyn TokenEstimator>,
}

impl Optimizer {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger,
            rewriter: Arc::new(HeuristicRewriter),
            estimator: Arc::new(CharRatioEstimator),
        }
    }

    pub fn with_rewriter(mut self, rewriter: Arc<dyn ArtifactRewriter>) -> Self {
        self.rewriter = rewriter;
        self
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    /// Compute the rewrite and its savings without touching disk or ledger
    pub fn optimize_content(
        &self,
        skill_id: &str,
        original: &str,
        score: &CandidateScore,
    ) -> Result<RewritePlan> {
        let content = self.rewriter.rewrite(original, score)?;
        debug!(
            "Rewrote {}: {} -> {} chars",
            skill_id,
            original.len(),
            content.len()
        );

        let original_tokens = self.estimator.estimate(original);
        let optimized_tokens = self.estimator.estimate(&content);
        let token_savings = original_tokens as i64 - optimized_tokens as i64;
        let savings_pct = if original_tokens == 0 {
            0.0
        } else {
            token_savings as f64 / original_tokens as f64 * 100.0
        };

        let time_savings_ms = (score.aggregate.mean_elapsed_ms * TIME_SAVINGS_FRACTION).max(0.0);

        Ok(RewritePlan {
            changes: describe_changes(original, &content),
            content,
            token_savings,
            savings_pct,
            time_savings: Duration::from_micros((time_savings_ms * 1000.0).round() as u64),
        })
    }

    /// Rewrite a skill's definition into its optimized artifact.
    ///
    /// An unreadable definition fails with `ContentUnavailable`, an
    /// unwritable artifact with `ArtifactWrite`; neither records anything.
    pub async fn optimize(
        &self,
        skill: &Skill,
        score: &CandidateScore,
    ) -> Result<OptimizationOutcome> {
        let original = skill.read_content()?;
        let plan = self.optimize_content(&skill.id, &original, score)?;
        let optimized_path = skill.write_optimized(&plan.content)?;

        self.ledger
            .register_skill(&skill.id, &skill.path.to_string_lossy())
            .await?;
        self.ledger.mark_optimized(&skill.id, plan.savings_pct).await?;
        self.ledger
            .record_event(&LifecycleEvent::new(
                ForgeModule::Optimizer,
                "optimized",
                &skill.id,
                format!("Saved ~{} tokens ({:.0}%)", plan.token_savings, plan.savings_pct),
            ))
            .await?;

        info!(
            "Optimized {}: ~{} tokens saved, written to {:?}",
            skill.id, plan.token_savings, optimized_path
        );

        Ok(OptimizationOutcome {
            skill_id: skill.id.clone(),
            original_path: skill.definition_path(),
            optimized_path,
            optimized_content: plan.content,
            changes: plan.changes,
            estimated_token_savings: plan.token_savings,
            estimated_time_savings: plan.time_savings,
        })
    }
}

/// Human-readable summary of what shrank
pub fn describe_changes(original: &str, optimized: &str) -> Vec<String> {
    let mut changes = Vec::new();

    let original_lines = original.split('\n').count();
    let optimized_lines = optimized.split('\n').count();
    if optimized_lines < original_lines {
        changes.push(format!("Reduced from {original_lines} to {optimized_lines} lines"));
    }

    let original_chars = original.chars().count();
    let optimized_chars = optimized.chars().count();
    if optimized_chars < original_chars {
        let pct = (1.0 - optimized_chars as f64 / original_chars as f64) * 100.0;
        changes.push(format!("{:.0}% fewer characters", pct));
    }

    changes
}

/// Rule-based rewriter: collapses blank runs, strips HTML comments, shortens
/// overlong bullets and drops repeated instructions, then stamps a header.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicRewriter;

fn blank_runs() -> Result<&'static Regex> {
    static CELL: OnceLock<Regex> = OnceLock::new();
    cached(&CELL, r"\n{3,}")
}

fn html_comments() -> Result<&'static Regex> {
    static CELL: OnceLock<Regex> = OnceLock::new();
    cached(&CELL, r"<!--[\s\S]*?-->")
}

fn long_bullets() -> Result<&'static Regex> {
    static CELL: OnceLock<Regex> = OnceLock::new();
    cached(&CELL, LONG_BULLET)
}

fn trailing_partial_word() -> Result<&'static Regex> {
    static CELL: OnceLock<Regex> = OnceLock::new();
    cached(&CELL, r"\s+\S*$")
}

impl HeuristicRewriter {
    fn shorten_bullet(partial_word: &Regex, text: &str) -> String {
        let cut: String = text.chars().take(SHORT_BULLET_CHARS).collect();
        partial_word.replace(&cut, "…").into_owned()
    }

    fn dedupe_lines(text: &str) -> String {
        let mut seen = HashSet::new();
        text.split('\n')
            .filter(|line| {
                let trimmed = line.trim();
                trimmed.is_empty() || trimmed.starts_with('#') || seen.insert(trimmed.to_string())
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl ArtifactRewriter for HeuristicRewriter {
    fn rewrite(&self, original: &str, _score: &CandidateScore) -> Result<String> {
        let partial_word = trailing_partial_word()?;

        let text = blank_runs()?.replace_all(original, "\n\n");
        let text = html_comments()?.replace_all(&text, "");
        let text = long_bullets()?.replace_all(&text, |caps: &regex::Captures| {
            format!("{}{}", &caps[1], Self::shorten_bullet(partial_word, &caps[2]))
        });
        let text = Self::dedupe_lines(&text);

        let original_chars = original.chars().count();
        let savings = if original_chars == 0 {
            0.0
        } else {
            (1.0 - text.chars().count() as f64 / original_chars as f64) * 100.0
        };

        Ok(format!(
            "<!-- Optimized by SkillForge | Estimated savings: {:.0}% tokens -->\n{}",
            savings, text
        ))
    }
}
