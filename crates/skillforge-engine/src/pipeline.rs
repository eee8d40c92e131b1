//! Forge pipeline
//!
//! Discover → Profile → Score → {Optimize → Validate → Promote | Reject} →
//! Export. A failure inside one skill's sub-pipeline is logged and reported;
//! only storage failures abort the batch.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use skillforge_persistence::Ledger;
use skillforge_skills::{Skill, SkillsRegistry};
use skillforge_types::{
    CandidateScore, DashboardExport, ForgeError, OptimizationOutcome, Result, ValidationVerdict,
};
use std::path::Path;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::optimizer::Optimizer;
use crate::profiler::Profiler;
use crate::scorer::Analyzer;
use crate::validator::{ValidationGate, DEFAULT_VALIDATION_ITERATIONS};

/// Knobs for one forge run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForgeOptions {
    /// Profiling iterations per skill
    pub iterations: usize,
    pub validation_iterations: usize,
    /// Log what would be optimized without writing artifacts or verdicts
    pub dry_run: bool,
    /// Skills profiled at the same time
    pub concurrency: usize,
}

impl Default for ForgeOptions {
    fn default() -> Self {
        Self {
            iterations: 5,
            validation_iterations: DEFAULT_VALIDATION_ITERATIONS,
            dry_run: false,
            concurrency: 4,
        }
    }
}

/// What happened to one skill
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SkillOutcome {
    /// Flagged, but the run was a dry run
    DryRun,
    Skipped {
        reason: String,
    },
    Promoted {
        outcome: OptimizationOutcome,
        verdict: ValidationVerdict,
    },
    Rejected {
        outcome: OptimizationOutcome,
        verdict: ValidationVerdict,
    },
    /// The skill's sub-pipeline aborted
    Failed {
        error: String,
    },
}

impl SkillOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            Self::DryRun => "dry_run",
            Self::Skipped { .. } => "skipped",
            Self::Promoted { .. } => "promoted",
            Self::Rejected { .. } => "rejected",
            Self::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkillReport {
    pub skill_id: String,
    #[serde(flatten)]
    pub outcome: SkillOutcome,
}

/// Everything one forge run produced
#[derive(Debug, Clone, Serialize)]
pub struct ForgeReport {
    pub run_id: Uuid,
    /// Skill ids found in the skills directory
    pub discovered: Vec<String>,
    /// Skill ids whose profiling completed
    pub profiled: Vec<String>,
    /// Every known skill's score, highest first
    pub scores: Vec<CandidateScore>,
    /// Per-skill outcomes for profiling failures and flagged candidates
    pub results: Vec<SkillReport>,
    pub export: DashboardExport,
}

impl ForgeReport {
    /// Number of results with the given status
    pub fn count(&self, status: &str) -> usize {
        self.results
            .iter()
            .filter(|report| report.outcome.status() == status)
            .count()
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{} discovered, {} profiled, {} flagged: {} promoted, {} rejected, {} skipped, {} failed",
            self.discovered.len(),
            self.profiled.len(),
            self.scores.iter().filter(|s| s.is_candidate()).count(),
            self.count("promoted"),
            self.count("rejected"),
            self.count("skipped"),
            self.count("failed"),
        )
    }
}

/// Wires the stages together over one ledger
pub struct Forge {
    ledger: Ledger,
    profiler: Profiler,
    analyzer: Analyzer,
    optimizer: Optimizer,
    gate: ValidationGate,
}

impl Forge {
    pub fn new(
        ledger: Ledger,
        profiler: Profiler,
        optimizer: Optimizer,
        gate: ValidationGate,
    ) -> Self {
        Self {
            analyzer: Analyzer::new(ledger.clone()),
            ledger,
            profiler,
            optimizer,
            gate,
        }
    }

    /// Run the whole pipeline over every skill under `skills_dir`
    pub async fn run(&self, skills_dir: &Path, options: &ForgeOptions) -> Result<ForgeReport> {
        let run_id = Uuid::new_v4();
        info!("Forge run {} over {:?}", run_id, skills_dir);

        let mut registry = SkillsRegistry::new().add_directory(skills_dir);
        registry.discover()?;
        debug!(
            "Skills under {:?}:\n{}",
            skills_dir,
            registry.generate_skills_list()
        );
        let discovered: Vec<String> = registry.skill_names().cloned().collect();

        let mut results = Vec::new();
        let mut profiled = Vec::new();

        let profiling: Vec<(String, Result<_>)> = stream::iter(registry.skills())
            .map(|skill| async move {
                (
                    skill.id.clone(),
                    self.profiler.profile_skill(skill, options.iterations).await,
                )
            })
            .buffer_unordered(options.concurrency.max(1))
            .collect()
            .await;

        for (skill_id, result) in profiling {
            match result {
                Ok(_) => profiled.push(skill_id),
                Err(e) if e.is_skill_local() => {
                    warn!("Profiling {} failed: {}", skill_id, e);
                    results.push(SkillReport {
                        skill_id,
                        outcome: SkillOutcome::Failed {
                            error: e.to_string(),
                        },
                    });
                }
                Err(e) => return Err(e),
            }
        }
        profiled.sort();
        info!("Profiled {} of {} skills", profiled.len(), discovered.len());

        let scores = self.analyzer.analyze_all().await?;

        for candidate in scores.iter().filter(|s| s.is_candidate()) {
            let outcome = match registry.get(&candidate.skill_id) {
                None => {
                    warn!("Skipping {}: not found under {:?}", candidate.skill_id, skills_dir);
                    SkillOutcome::Skipped {
                        reason: format!("no skill directory under {}", skills_dir.display()),
                    }
                }
                Some(_) if options.dry_run => {
                    info!(
                        "[dry run] would optimize {} (score {})",
                        candidate.skill_id, candidate.score
                    );
                    SkillOutcome::DryRun
                }
                Some(skill) => match self.forge_skill(skill, candidate, options).await {
                    Ok(outcome) => outcome,
                    Err(e) if e.is_skill_local() => {
                        error!("Forging {} aborted: {}", candidate.skill_id, e);
                        SkillOutcome::Failed {
                            error: e.to_string(),
                        }
                    }
                    Err(e) => return Err(e),
                },
            };

            results.push(SkillReport {
                skill_id: candidate.skill_id.clone(),
                outcome,
            });
        }

        let export = self.ledger.export().await?;

        let report = ForgeReport {
            run_id,
            discovered,
            profiled,
            scores,
            results,
            export,
        };
        info!("Forge run {} finished: {}", run_id, report.summary_line());
        Ok(report)
    }

    /// Optimize, validate, then promote or reject a single candidate
    async fn forge_skill(
        &self,
        skill: &Skill,
        candidate: &CandidateScore,
        options: &ForgeOptions,
    ) -> Result<SkillOutcome> {
        let outcome = match self.optimizer.optimize(skill, candidate).await {
            Ok(outcome) => outcome,
            Err(ForgeError::ContentUnavailable { path, source }) => {
                warn!("Skipping {}: cannot read {:?}: {}", skill.id, path, source);
                return Ok(SkillOutcome::Skipped {
                    reason: format!("cannot read {}: {}", path.display(), source),
                });
            }
            Err(e) => return Err(e),
        };

        let verdict = self
            .gate
            .validate_skill(skill, options.validation_iterations)
            .await?;

        if verdict.passed {
            self.ledger
                .promote(
                    &skill.id,
                    &verdict.target_version,
                    &format!("Promoted to {}: {}", verdict.target_version, verdict.summary()),
                )
                .await?;
            Ok(SkillOutcome::Promoted { outcome, verdict })
        } else {
            self.ledger.mark_rejected(&skill.id).await?;
            info!("Rejected optimization of {}", skill.id);
            Ok(SkillOutcome::Rejected { outcome, verdict })
        }
    }
}
