//! End-to-end forge runs with deterministic executors

use async_trait::async_trait;
use skillforge_engine::{
    Analyzer, ExecutionReport, Forge, ForgeOptions, Optimizer, Profiler, SkillExecutor,
    SkillOutcome, ValidationGate,
};
use skillforge_persistence::Ledger;
use skillforge_types::{ForgeError, ForgeModule, OptimizationState, Recommendation};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Elapsed time grows with content length; output size is fixed
struct LengthExecutor;

#[async_trait]
impl SkillExecutor for LengthExecutor {
    async fn execute(&self, content: &str) -> ExecutionReport {
        ExecutionReport {
            elapsed: Duration::from_millis(content.len() as u64),
            output_tokens: 2500,
            success: true,
        }
    }
}

/// Never finishes on optimized artifacts
struct StallsOnOptimized;

#[async_trait]
impl SkillExecutor for StallsOnOptimized {
    async fn execute(&self, content: &str) -> ExecutionReport {
        if content.starts_with("<!-- Optimized") {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        LengthExecutor.execute(content).await
    }
}

/// Deletes a file every time it runs, then behaves like `LengthExecutor`
struct DeletesFile(PathBuf);

#[async_trait]
impl SkillExecutor for DeletesFile {
    async fn execute(&self, content: &str) -> ExecutionReport {
        let _ = fs::remove_file(&self.0);
        LengthExecutor.execute(content).await
    }
}

/// Many distinct steps plus a heavily repeated instruction: shrinks a lot
/// under rewriting while keeping its vocabulary
fn redundant_skill() -> String {
    let mut content = String::from("# Research helper\n");
    for i in 0..40 {
        content.push_str(&format!("Step {i}: check item {i} carefully.\n"));
    }
    for _ in 0..200 {
        content.push_str("Always cite the source document when answering.\n");
    }
    content
}

/// Long but with nothing to remove: the rewrite only adds a header
fn dense_skill() -> String {
    (0..250)
        .map(|i| format!("Line {i} explains rule number {i} in detail.\n"))
        .collect()
}

fn make_skill(root: &Path, id: &str, content: &str) {
    let dir = root.join(id);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("SKILL.md"), content).unwrap();
}

async fn setup(dir: &TempDir) -> Ledger {
    Ledger::open(dir.path().join("ledger.db")).await.unwrap()
}

fn forge(ledger: &Ledger, validation: Arc<dyn SkillExecutor>, timeout: Duration) -> Forge {
    Forge::new(
        ledger.clone(),
        Profiler::new(ledger.clone(), Arc::new(LengthExecutor)),
        Optimizer::new(ledger.clone()),
        ValidationGate::new(ledger.clone(), validation).with_timeout(timeout),
    )
}

fn options(dry_run: bool) -> ForgeOptions {
    ForgeOptions {
        iterations: 5,
        validation_iterations: 3,
        dry_run,
        concurrency: 2,
    }
}

#[tokio::test]
async fn test_forge_promotes_shrinking_rewrite() {
    let state = TempDir::new().unwrap();
    let skills = TempDir::new().unwrap();
    make_skill(skills.path(), "research", &redundant_skill());
    make_skill(skills.path(), "greet", "# Greet\nSay hello.");

    let ledger = setup(&state).await;
    let report = forge(&ledger, Arc::new(LengthExecutor), Duration::from_secs(5))
        .run(skills.path(), &options(false))
        .await
        .unwrap();

    assert_eq!(report.discovered, vec!["greet", "research"]);
    assert_eq!(report.profiled, vec!["greet", "research"]);

    // 30 for tokens + 25 for latency
    assert_eq!(report.scores[0].skill_id, "research");
    assert_eq!(report.scores[0].score, 55);
    assert_eq!(report.scores[0].recommendation, Recommendation::Optimize);
    assert_eq!(report.scores[1].recommendation, Recommendation::Ok);

    assert_eq!(report.results.len(), 1);
    match &report.results[0].outcome {
        SkillOutcome::Promoted { outcome, verdict } => {
            assert!(verdict.passed);
            assert_eq!(verdict.target_version, "v2");
            assert!(verdict.similarity > 0.7);
            assert!(verdict.token_savings > 0.0);
            assert_eq!(verdict.original_timings_ms.len(), 3);
            assert!(outcome.estimated_token_savings > 0);
            assert!(outcome.optimized_path.is_file());
        }
        other => panic!("expected promotion, got {other:?}"),
    }

    let record = ledger.skill_record("research").await.unwrap().unwrap();
    assert_eq!(record.state, OptimizationState::Promoted);
    assert_eq!(record.current_version, "v2");

    let greet = ledger.skill_record("greet").await.unwrap().unwrap();
    assert_eq!(greet.state, OptimizationState::Pending);

    let events = &report.export.events;
    assert_eq!(events[0].module, ForgeModule::Forge);
    assert_eq!(events[0].action, "promoted");
    assert_eq!(events[1].module, ForgeModule::Validator);
    assert_eq!(events[1].action, "passed");
    assert_eq!(events[2].module, ForgeModule::Optimizer);
    assert_eq!(report.export.summary.skills_tracked, 2);
    assert_eq!(report.export.summary.total_runs, 10);
    assert!(report.export.summary.avg_token_savings_pct > 0.0);
}

#[tokio::test]
async fn test_forge_rejects_rewrite_without_savings() {
    let state = TempDir::new().unwrap();
    let skills = TempDir::new().unwrap();
    make_skill(skills.path(), "dense", &dense_skill());

    let ledger = setup(&state).await;
    let report = forge(&ledger, Arc::new(LengthExecutor), Duration::from_secs(5))
        .run(skills.path(), &options(false))
        .await
        .unwrap();

    match &report.results[0].outcome {
        SkillOutcome::Rejected { verdict, .. } => {
            assert!(!verdict.passed);
            assert!(verdict.token_savings < 0.0);
        }
        other => panic!("expected rejection, got {other:?}"),
    }

    let record = ledger.skill_record("dense").await.unwrap().unwrap();
    assert_eq!(record.state, OptimizationState::Rejected);
    assert_eq!(record.current_version, "v1");

    // Rejection adds no event of its own
    let latest = &report.export.events[0];
    assert_eq!(latest.module, ForgeModule::Validator);
    assert_eq!(latest.action, "failed");
    assert!(report
        .export
        .events
        .iter()
        .all(|event| event.module != ForgeModule::Forge));
}

#[tokio::test]
async fn test_dry_run_writes_no_artifacts() {
    let state = TempDir::new().unwrap();
    let skills = TempDir::new().unwrap();
    make_skill(skills.path(), "research", &redundant_skill());

    let ledger = setup(&state).await;
    let report = forge(&ledger, Arc::new(LengthExecutor), Duration::from_secs(5))
        .run(skills.path(), &options(true))
        .await
        .unwrap();

    assert!(matches!(report.results[0].outcome, SkillOutcome::DryRun));
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["results"][0]["status"], "dry_run");
    assert_eq!(json["results"][0]["skill_id"], "research");
    assert!(!skills.path().join("research/SKILL.optimized.md").exists());

    let record = ledger.skill_record("research").await.unwrap().unwrap();
    assert_eq!(record.state, OptimizationState::Pending);
    assert!(report
        .export
        .events
        .iter()
        .all(|event| event.module == ForgeModule::Profiler));
}

#[tokio::test]
async fn test_candidate_without_directory_is_skipped() {
    let state = TempDir::new().unwrap();
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    make_skill(first.path(), "research", &redundant_skill());

    let ledger = setup(&state).await;
    let forge = forge(&ledger, Arc::new(LengthExecutor), Duration::from_secs(5));
    forge.run(first.path(), &options(true)).await.unwrap();

    let report = forge.run(second.path(), &options(false)).await.unwrap();
    assert!(report.discovered.is_empty());
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].skill_id, "research");
    assert!(matches!(report.results[0].outcome, SkillOutcome::Skipped { .. }));
}

#[tokio::test]
async fn test_validation_timeout_fails_only_that_skill() {
    let state = TempDir::new().unwrap();
    let skills = TempDir::new().unwrap();
    make_skill(skills.path(), "research", &redundant_skill());
    make_skill(skills.path(), "dense", &dense_skill());

    let ledger = setup(&state).await;
    let report = forge(&ledger, Arc::new(StallsOnOptimized), Duration::from_millis(50))
        .run(skills.path(), &options(false))
        .await
        .unwrap();

    assert_eq!(report.results.len(), 2);
    assert_eq!(report.count("failed"), 2);
    for result in &report.results {
        match &result.outcome {
            SkillOutcome::Failed { error } => assert!(error.contains("timed out")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    // Optimization happened, the verdict never did
    let record = ledger.skill_record("research").await.unwrap().unwrap();
    assert_eq!(record.state, OptimizationState::Optimized);
}

#[tokio::test]
async fn test_validate_identical_content_does_not_pass() {
    let state = TempDir::new().unwrap();
    let ledger = setup(&state).await;
    let gate = ValidationGate::new(ledger.clone(), Arc::new(LengthExecutor));

    let content = "Summarize the document in three bullet points.";
    let verdict = gate.validate("summarize", content, content, 3).await.unwrap();

    assert_eq!(verdict.similarity, 1.0);
    assert_eq!(verdict.token_savings, 0.0);
    assert_eq!(verdict.speed_improvement, 0.0);
    assert!(!verdict.passed);
    assert_eq!(verdict.target_version, "v2");

    let events = ledger.recent_events(1).await.unwrap();
    assert_eq!(events[0].action, "failed");
    assert_eq!(
        events[0].details,
        "Similarity: 100%, Speed: 0% faster, Tokens: 0% saved"
    );
}

#[tokio::test]
async fn test_savings_are_directional() {
    let state = TempDir::new().unwrap();
    let ledger = setup(&state).await;
    let gate = ValidationGate::new(ledger, Arc::new(LengthExecutor));

    let long = "alpha beta gamma delta ".repeat(10);
    let short = "alpha beta gamma delta ".repeat(5);

    let forward = gate.validate("s", &long, &short, 1).await.unwrap();
    let backward = gate.validate("s", &short, &long, 1).await.unwrap();

    assert!(forward.token_savings > 0.0);
    assert!(backward.token_savings < 0.0);
    assert_eq!(forward.similarity, backward.similarity);
    assert!(forward.passed);
    assert!(!backward.passed);
}

#[tokio::test]
async fn test_profiling_unreadable_skill_records_nothing() {
    let state = TempDir::new().unwrap();
    let skills = TempDir::new().unwrap();
    make_skill(skills.path(), "gone", "temporary");

    let skill = skillforge_skills::Skill::from_dir(&skills.path().join("gone")).unwrap();
    fs::remove_file(skills.path().join("gone/SKILL.md")).unwrap();

    let ledger = setup(&state).await;
    let profiler = Profiler::new(ledger.clone(), Arc::new(LengthExecutor));
    let err = profiler.profile_skill(&skill, 3).await.unwrap_err();

    assert!(matches!(err, ForgeError::ContentUnavailable { .. }));
    assert_eq!(ledger.aggregate("gone").await.unwrap().total_runs, 0);
    assert!(ledger.skill_record("gone").await.unwrap().is_none());
}

#[tokio::test]
async fn test_profiling_timeout_becomes_failed_sample() {
    struct Stalls;

    #[async_trait]
    impl SkillExecutor for Stalls {
        async fn execute(&self, _content: &str) -> ExecutionReport {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            ExecutionReport::timed_out(Duration::ZERO)
        }
    }

    let state = TempDir::new().unwrap();
    let skills = TempDir::new().unwrap();
    make_skill(skills.path(), "slow", "# Slow");
    let skill = skillforge_skills::Skill::from_dir(&skills.path().join("slow")).unwrap();

    let ledger = setup(&state).await;
    let profiler =
        Profiler::new(ledger.clone(), Arc::new(Stalls)).with_timeout(Duration::from_millis(20));
    let view = profiler.profile_skill(&skill, 2).await.unwrap();

    assert_eq!(view.total_runs, 2);
    assert_eq!(view.failure_rate, 1.0);
    assert_eq!(view.mean_elapsed_ms, 20.0);

    let events = ledger.recent_events(1).await.unwrap();
    assert_eq!(events[0].details, "Profiled 2 iterations (2 failed)");
}

#[tokio::test]
async fn test_definition_removed_after_profiling_is_skipped() {
    let state = TempDir::new().unwrap();
    let skills = TempDir::new().unwrap();
    make_skill(skills.path(), "research", &redundant_skill());
    let definition = skills.path().join("research/SKILL.md");

    let ledger = setup(&state).await;
    let forge = Forge::new(
        ledger.clone(),
        Profiler::new(ledger.clone(), Arc::new(DeletesFile(definition))),
        Optimizer::new(ledger.clone()),
        ValidationGate::new(ledger.clone(), Arc::new(LengthExecutor)),
    );
    let report = forge.run(skills.path(), &options(false)).await.unwrap();

    assert_eq!(report.profiled, vec!["research"]);
    assert_eq!(report.results.len(), 1);
    match &report.results[0].outcome {
        SkillOutcome::Skipped { reason } => assert!(reason.starts_with("cannot read")),
        other => panic!("expected skip, got {other:?}"),
    }
    assert_eq!(report.count("skipped"), 1);
    assert!(!skills.path().join("research/SKILL.optimized.md").exists());

    let record = ledger.skill_record("research").await.unwrap().unwrap();
    assert_eq!(record.state, OptimizationState::Pending);
    assert!(report
        .export
        .events
        .iter()
        .all(|event| event.module == ForgeModule::Profiler));
}

#[tokio::test]
async fn test_unwritable_artifact_fails_instead_of_skipping() {
    let state = TempDir::new().unwrap();
    let skills = TempDir::new().unwrap();
    make_skill(skills.path(), "research", &redundant_skill());
    fs::create_dir(skills.path().join("research/SKILL.optimized.md")).unwrap();

    let ledger = setup(&state).await;
    let report = forge(&ledger, Arc::new(LengthExecutor), Duration::from_secs(5))
        .run(skills.path(), &options(false))
        .await
        .unwrap();

    match &report.results[0].outcome {
        SkillOutcome::Failed { error } => assert!(error.starts_with("Failed to write artifact")),
        other => panic!("expected failure, got {other:?}"),
    }

    let record = ledger.skill_record("research").await.unwrap().unwrap();
    assert_eq!(record.state, OptimizationState::Pending);
    assert!(report
        .export
        .events
        .iter()
        .all(|event| event.module == ForgeModule::Profiler));
}

#[tokio::test]
async fn test_optimizing_deleted_definition_changes_nothing() {
    let state = TempDir::new().unwrap();
    let skills = TempDir::new().unwrap();
    make_skill(skills.path(), "research", &redundant_skill());
    let skill = skillforge_skills::Skill::from_dir(&skills.path().join("research")).unwrap();

    let ledger = setup(&state).await;
    Profiler::new(ledger.clone(), Arc::new(LengthExecutor))
        .profile_skill(&skill, 5)
        .await
        .unwrap();
    let score = Analyzer::new(ledger.clone()).analyze("research").await.unwrap();
    assert!(score.is_candidate());

    fs::remove_file(skill.definition_path()).unwrap();
    let err = Optimizer::new(ledger.clone())
        .optimize(&skill, &score)
        .await
        .unwrap_err();

    assert!(matches!(err, ForgeError::ContentUnavailable { .. }));
    assert!(!skill.optimized_path().exists());

    let record = ledger.skill_record("research").await.unwrap().unwrap();
    assert_eq!(record.state, OptimizationState::Pending);
    assert_eq!(record.token_savings_pct, None);
    let events = ledger.recent_events(10).await.unwrap();
    assert!(events.iter().all(|event| event.module != ForgeModule::Optimizer));
}

#[tokio::test]
async fn test_validating_without_artifact_records_nothing() {
    let state = TempDir::new().unwrap();
    let skills = TempDir::new().unwrap();
    make_skill(skills.path(), "greet", "# Greet\nSay hello.");
    let skill = skillforge_skills::Skill::from_dir(&skills.path().join("greet")).unwrap();

    let ledger = setup(&state).await;
    let gate = ValidationGate::new(ledger.clone(), Arc::new(LengthExecutor));
    let err = gate.validate_skill(&skill, 3).await.unwrap_err();

    assert!(matches!(
        err,
        ForgeError::ContentUnavailable { ref path, .. } if path.ends_with("SKILL.optimized.md")
    ));
    assert!(ledger.recent_events(10).await.unwrap().is_empty());
}
