//! Ledger behaviour against a real SQLite file

use chrono::{Duration as ChronoDuration, Utc};
use skillforge_persistence::Ledger;
use skillforge_types::{ForgeError, ForgeModule, LifecycleEvent, OptimizationState, RunSample};
use std::time::Duration;
use tempfile::TempDir;

async fn open_ledger(dir: &TempDir) -> Ledger {
    Ledger::open(dir.path().join("forge").join("ledger.db"))
        .await
        .expect("Failed to open ledger")
}

fn run(skill: &str, ms: u64, success: bool) -> RunSample {
    RunSample::new(skill, Duration::from_millis(ms), 1000, 500, success)
}

#[tokio::test]
async fn test_empty_skill_aggregates_to_zero() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;

    let view = ledger.aggregate("never-ran").await.unwrap();
    assert_eq!(view.skill_id, "never-ran");
    assert_eq!(view.total_runs, 0);
    assert_eq!(view.mean_elapsed_ms, 0.0);
    assert_eq!(view.failure_rate, 0.0);
    assert_eq!(view.p95_elapsed_ms, 0.0);
}

#[tokio::test]
async fn test_registration_keeps_first_locator() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;

    assert!(ledger.register_skill("summarize", "/skills/a").await.unwrap());
    assert!(!ledger.register_skill("summarize", "/skills/b").await.unwrap());

    let record = ledger.skill_record("summarize").await.unwrap().unwrap();
    assert_eq!(record.locator, "/skills/a");
    assert_eq!(record.current_version, "v1");
    assert_eq!(record.state, OptimizationState::Pending);
    assert_eq!(record.token_savings_pct, None);
}

#[tokio::test]
async fn test_known_skills_come_from_runs_only() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;

    ledger.register_skill("registered-only", "/skills/r").await.unwrap();
    ledger.record_run(&run("beta", 100, true)).await.unwrap();
    ledger.record_run(&run("alpha", 100, true)).await.unwrap();
    ledger.record_run(&run("beta", 100, true)).await.unwrap();

    let known = ledger.list_known_skills().await.unwrap();
    assert_eq!(known, vec!["beta".to_string(), "alpha".to_string()]);

    let registered = ledger.registered_skills().await.unwrap();
    assert_eq!(registered.len(), 1);
    assert_eq!(registered[0].skill_id, "registered-only");
}

#[tokio::test]
async fn test_window_follows_insertion_order_not_timestamp() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;

    // Later insertions carry older timestamps; the window must still pick them.
    let now = Utc::now();
    for (i, ms) in [100u64, 200, 300, 400].iter().enumerate() {
        let sample = RunSample {
            timestamp: now - ChronoDuration::minutes(i as i64),
            ..run("s", *ms, true)
        };
        ledger.record_run(&sample).await.unwrap();
    }

    let view = ledger.aggregate_window("s", 2).await.unwrap();
    assert_eq!(view.total_runs, 2);
    assert!((view.mean_elapsed_ms - 350.0).abs() < 1e-6);

    let recent = ledger.recent_runs("s", 2).await.unwrap();
    assert_eq!(recent[0].elapsed, Duration::from_millis(300));
    assert_eq!(recent[1].elapsed, Duration::from_millis(400));
}

#[tokio::test]
async fn test_configured_window_limits_aggregate() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await.with_window(3);

    for success in [false, false, true, true, true] {
        ledger.record_run(&run("s", 100, success)).await.unwrap();
    }

    let view = ledger.aggregate("s").await.unwrap();
    assert_eq!(view.total_runs, 3);
    assert_eq!(view.failure_rate, 0.0);
}

#[tokio::test]
async fn test_samples_round_trip_through_storage() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;

    let sample = RunSample {
        version: "v3".to_string(),
        ..RunSample::new("s", Duration::from_micros(1_234_567), 42, 7, false)
    };
    ledger.record_run(&sample).await.unwrap();

    let stored = ledger.recent_runs("s", 10).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].elapsed, sample.elapsed);
    assert_eq!(stored[0].tokens_in, 42);
    assert_eq!(stored[0].tokens_out, 7);
    assert!(!stored[0].success);
    assert_eq!(stored[0].version, "v3");
    assert_eq!(stored[0].timestamp.timestamp(), sample.timestamp.timestamp());
}

#[tokio::test]
async fn test_recent_events_newest_first() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;

    for i in 0..5 {
        let event = LifecycleEvent::new(ForgeModule::Profiler, "recorded", "s", format!("run {i}"));
        ledger.record_event(&event).await.unwrap();
    }

    let events = ledger.recent_events(3).await.unwrap();
    let details: Vec<_> = events.iter().map(|e| e.details.as_str()).collect();
    assert_eq!(details, vec!["run 4", "run 3", "run 2"]);
}

#[tokio::test]
async fn test_promotion_updates_registry_and_logs_event() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;

    ledger.register_skill("s", "/skills/s").await.unwrap();
    assert_eq!(ledger.next_version("s").await.unwrap(), "v2");

    ledger.mark_optimized("s", 25.0).await.unwrap();
    let record = ledger.skill_record("s").await.unwrap().unwrap();
    assert_eq!(record.state, OptimizationState::Optimized);
    assert_eq!(record.token_savings_pct, Some(25.0));

    ledger.promote("s", "v2", "v2 promoted after passing validation").await.unwrap();
    let record = ledger.skill_record("s").await.unwrap().unwrap();
    assert_eq!(record.state, OptimizationState::Promoted);
    assert_eq!(record.current_version, "v2");
    assert_eq!(ledger.next_version("s").await.unwrap(), "v3");

    let events = ledger.recent_events(1).await.unwrap();
    assert_eq!(events[0].module, ForgeModule::Forge);
    assert_eq!(events[0].action, "promoted");
}

#[tokio::test]
async fn test_rejection_is_registry_state_only() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;

    ledger.register_skill("s", "/skills/s").await.unwrap();
    ledger.mark_optimized("s", 10.0).await.unwrap();
    ledger.mark_rejected("s").await.unwrap();

    let record = ledger.skill_record("s").await.unwrap().unwrap();
    assert_eq!(record.state, OptimizationState::Rejected);
    assert_eq!(record.current_version, "v1");
    assert!(ledger.recent_events(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_state_changes_require_registration() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;

    let err = ledger.promote("ghost", "v2", "").await.unwrap_err();
    assert!(matches!(err, ForgeError::UnknownSkill(id) if id == "ghost"));
    assert!(ledger.recent_events(10).await.unwrap().is_empty());

    assert!(matches!(
        ledger.mark_rejected("ghost").await,
        Err(ForgeError::UnknownSkill(_))
    ));
}

#[tokio::test]
async fn test_export_snapshot() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;

    ledger.record_run(&run("a", 100, true)).await.unwrap();
    ledger.record_run(&run("a", 300, true)).await.unwrap();
    ledger.record_run(&run("b", 400, false)).await.unwrap();
    ledger.register_skill("a", "/skills/a").await.unwrap();
    ledger.mark_optimized("a", 30.0).await.unwrap();

    for i in 0..120 {
        let event = LifecycleEvent::new(ForgeModule::Analyzer, "ok", "a", format!("{i}"));
        ledger.record_event(&event).await.unwrap();
    }

    let export = ledger.export().await.unwrap();
    assert_eq!(export.summary.skills_tracked, 2);
    assert_eq!(export.summary.total_runs, 3);
    assert!((export.summary.avg_runtime_ms - 300.0).abs() < 1e-6);
    assert!((export.summary.avg_token_savings_pct - 30.0).abs() < 1e-6);
    assert_eq!(export.summary.skipped_records, 0);
    assert_eq!(export.skills.len(), 2);
    assert_eq!(export.events.len(), 100);
    assert_eq!(export.events[0].details, "119");

    let json = serde_json::to_value(&export).unwrap();
    assert!(json["summary"]["skills_tracked"].is_number());
    assert!(json["events"].is_array());
}

#[tokio::test]
async fn test_concurrent_appends_are_all_recorded() {
    let dir = TempDir::new().unwrap();
    let ledger = open_ledger(&dir).await;

    let mut tasks = tokio::task::JoinSet::new();
    for worker in 0..4 {
        let ledger = ledger.clone();
        tasks.spawn(async move {
            for _ in 0..25 {
                ledger
                    .record_run(&run(&format!("skill-{worker}"), 10, true))
                    .await
                    .unwrap();
            }
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }

    let export = ledger.export().await.unwrap();
    assert_eq!(export.summary.skills_tracked, 4);
    assert_eq!(export.summary.total_runs, 100);
}
