//! Candidate scoring
//!
//! Five independent additive factors, each capped before summing. The total
//! is clamped to 0-100 and rounded; the recommendation follows from it.

use skillforge_persistence::Ledger;
use skillforge_types::{AggregateView, CandidateScore, ForgeModule, LifecycleEvent, Result};
use tracing::{debug, info};

/// Mean tokens per run above which token volume counts against a skill
const TOKEN_THRESHOLD: f64 = 2000.0;
const TOKEN_CAP: f64 = 30.0;
/// Mean latency (ms) above which latency counts against a skill
const LATENCY_THRESHOLD_MS: f64 = 2000.0;
const LATENCY_CAP: f64 = 25.0;
const TAIL_SPIKE_RATIO: f64 = 2.0;
const TAIL_SPIKE_POINTS: f64 = 20.0;
const FAILURE_THRESHOLD: f64 = 0.05;
const FAILURE_CAP: f64 = 15.0;
const VOLUME_THRESHOLD: u64 = 20;
const VOLUME_CAP: f64 = 10.0;

/// Score one aggregate. Pure and deterministic.
pub fn score(aggregate: &AggregateView) -> CandidateScore {
    if aggregate.is_empty() {
        return CandidateScore::new(aggregate.clone(), 0, Vec::new());
    }

    let mut reasons = Vec::new();
    let mut total = 0.0;

    let tokens = aggregate.mean_total_tokens();
    if tokens > TOKEN_THRESHOLD {
        total += ((tokens - TOKEN_THRESHOLD) / 100.0).min(TOKEN_CAP);
        reasons.push(format!("High token usage: {} avg tokens/run", tokens.round()));
    }

    let mean = aggregate.mean_elapsed_ms;
    if mean > LATENCY_THRESHOLD_MS {
        total += ((mean - LATENCY_THRESHOLD_MS) / 200.0).min(LATENCY_CAP);
        reasons.push(format!("Slow execution: {}ms avg", mean.round()));
    }

    if aggregate.p95_elapsed_ms > mean * TAIL_SPIKE_RATIO {
        total += TAIL_SPIKE_POINTS;
        reasons.push(format!(
            "Latency spikes: P95 {}ms vs avg {}ms",
            aggregate.p95_elapsed_ms.round(),
            mean.round()
        ));
    }

    if aggregate.failure_rate > FAILURE_THRESHOLD {
        total += (aggregate.failure_rate * 100.0).min(FAILURE_CAP);
        reasons.push(format!("High failure rate: {:.1}%", aggregate.failure_rate * 100.0));
    }

    if aggregate.total_runs > VOLUME_THRESHOLD {
        total += (aggregate.total_runs as f64 / 10.0).min(VOLUME_CAP);
        reasons.push(format!("High volume: {} runs", aggregate.total_runs));
    }

    let rounded = total.clamp(0.0, 100.0).round() as u8;
    CandidateScore::new(aggregate.clone(), rounded, reasons)
}

/// Scores skills straight from the ledger
#[derive(Clone)]
pub struct Analyzer {
    ledger: Ledger,
}

impl Analyzer {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    /// Score a single skill from its current aggregate
    pub async fn analyze(&self, skill_id: &str) -> Result<CandidateScore> {
        let aggregate = self.ledger.aggregate(skill_id).await?;
        Ok(score(&aggregate))
    }

    /// Score every known skill, highest score first. Ties keep the order of
    /// `list_known_skills`.
    pub async fn analyze_all(&self) -> Result<Vec<CandidateScore>> {
        let skill_ids = self.ledger.list_known_skills().await?;
        let mut scores = Vec::with_capacity(skill_ids.len());
        for skill_id in &skill_ids {
            scores.push(self.analyze(skill_id).await?);
        }

        rank(&mut scores);
        info!("Analyzed {} skills", scores.len());
        Ok(scores)
    }

    /// Append one `analyzer` event per score
    pub async fn record_verdicts(&self, scores: &[CandidateScore]) -> Result<()> {
        for candidate in scores {
            let event = LifecycleEvent::new(
                ForgeModule::Analyzer,
                candidate.recommendation.as_str(),
                &candidate.skill_id,
                format!("Score {}: {}", candidate.score, candidate.reasons.join("; ")),
            );
            self.ledger.record_event(&event).await?;
            debug!("{} scored {}", candidate.skill_id, candidate.score);
        }
        Ok(())
    }
}

/// Stable sort by score, descending
pub fn rank(scores: &mut [CandidateScore]) {
    scores.sort_by(|a, b| b.score.cmp(&a.score));
}
