//! SkillForge metrics ledger
//!
//! Append-only storage of run samples and lifecycle events plus the skill
//! registry, backed by SQLite. Every append is a single `INSERT`, so records
//! are never partially applied and readers only observe committed rows.
//! Nothing here deletes samples: growth is unbounded on disk, while reads are
//! bounded by the aggregation window and the export event limit.

pub mod aggregate;
mod schema;

use chrono::{DateTime, Utc};
use skillforge_types::{
    next_version, AggregateView, DashboardExport, ExportSummary, ForgeError, ForgeModule,
    LifecycleEvent, OptimizationState, Result, RunSample, SkillRecord, EXPORT_EVENT_LIMIT,
};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::Row;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

pub use aggregate::{aggregate_samples, DEFAULT_WINDOW};

/// Read-side health of the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerDiagnostics {
    /// Distinct stored records that could not be parsed and were skipped
    pub skipped_records: u64,
}

/// The single source of truth for samples, events and the skill registry
#[derive(Clone)]
pub struct Ledger {
    pool: SqlitePool,
    window: usize,
    skipped: Arc<Mutex<BTreeSet<(&'static str, i64)>>>,
}

impl Ledger {
    /// Open (or create) the ledger database at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(ForgeError::storage)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ForgeError::storage)?;

        let ledger = Self {
            pool,
            window: DEFAULT_WINDOW,
            skipped: Arc::new(Mutex::new(BTreeSet::new())),
        };
        ledger.run_migrations().await?;

        info!("Ledger opened at {}", path.display());
        Ok(ledger)
    }

    /// Override the aggregation window (most recent samples per skill)
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    async fn run_migrations(&self) -> Result<()> {
        for statement in schema::MIGRATIONS {
            sqlx::query(*statement)
                .execute(&self.pool)
                .await
                .map_err(ForgeError::storage)?;
        }
        debug!("Ledger migrations completed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Appends
    // ------------------------------------------------------------------

    /// Append a run sample
    pub async fn record_run(&self, sample: &RunSample) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO runs (skill_id, elapsed_us, tokens_in, tokens_out, success, timestamp, version)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&sample.skill_id)
        .bind(i64::try_from(sample.elapsed.as_micros()).unwrap_or(i64::MAX))
        .bind(to_i64(sample.tokens_in))
        .bind(to_i64(sample.tokens_out))
        .bind(sample.success)
        .bind(sample.timestamp.to_rfc3339())
        .bind(&sample.version)
        .execute(&self.pool)
        .await
        .map_err(ForgeError::storage)?;

        Ok(())
    }

    /// Append a lifecycle event
    pub async fn record_event(&self, event: &LifecycleEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO events (timestamp, module, action, skill_id, details)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.timestamp.to_rfc3339())
        .bind(event.module.as_str())
        .bind(&event.action)
        .bind(&event.skill_id)
        .bind(&event.details)
        .execute(&self.pool)
        .await
        .map_err(ForgeError::storage)?;

        debug!(
            module = event.module.as_str(),
            action = %event.action,
            skill = %event.skill_id,
            "Event recorded"
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------

    /// Register a skill's locator. The first registration wins; later calls
    /// with a different locator are ignored. Returns whether a row was written.
    pub async fn register_skill(&self, skill_id: &str, locator: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO skills (skill_id, locator, current_version, state, updated_at)
            VALUES (?, ?, 'v1', 'pending', ?)
            "#,
        )
        .bind(skill_id)
        .bind(locator)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(ForgeError::storage)?;

        let inserted = result.rows_affected() == 1;
        if inserted {
            debug!("Registered skill {} at {}", skill_id, locator);
        }
        Ok(inserted)
    }

    /// Look up a skill's registry row
    pub async fn skill_record(&self, skill_id: &str) -> Result<Option<SkillRecord>> {
        let row = sqlx::query(
            r#"
            SELECT rowid AS seq, skill_id, locator, current_version, state, token_savings_pct, updated_at
            FROM skills
            WHERE skill_id = ?
            "#,
        )
        .bind(skill_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ForgeError::storage)?;

        match row {
            Some(row) => Ok(self.keep_valid(parse_skill(&row))?),
            None => Ok(None),
        }
    }

    /// All registered skills, in registration order
    pub async fn registered_skills(&self) -> Result<Vec<SkillRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT rowid AS seq, skill_id, locator, current_version, state, token_savings_pct, updated_at
            FROM skills
            ORDER BY rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ForgeError::storage)?;

        self.parse_all(&rows, parse_skill)
    }

    /// Record that an optimized artifact was produced
    pub async fn mark_optimized(&self, skill_id: &str, token_savings_pct: f64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE skills SET state = ?, token_savings_pct = ?, updated_at = ? WHERE skill_id = ?",
        )
        .bind(OptimizationState::Optimized.as_str())
        .bind(token_savings_pct)
        .bind(Utc::now().to_rfc3339())
        .bind(skill_id)
        .execute(&self.pool)
        .await
        .map_err(ForgeError::storage)?;

        if result.rows_affected() == 0 {
            return Err(ForgeError::UnknownSkill(skill_id.to_string()));
        }
        Ok(())
    }

    /// Record that the gate rejected the last optimized artifact
    pub async fn mark_rejected(&self, skill_id: &str) -> Result<()> {
        let result = sqlx::query("UPDATE skills SET state = ?, updated_at = ? WHERE skill_id = ?")
            .bind(OptimizationState::Rejected.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(skill_id)
            .execute(&self.pool)
            .await
            .map_err(ForgeError::storage)?;

        if result.rows_affected() == 0 {
            return Err(ForgeError::UnknownSkill(skill_id.to_string()));
        }
        Ok(())
    }

    /// Promote `version` to the skill's baseline and append the
    /// `forge/promoted` event, atomically.
    pub async fn promote(&self, skill_id: &str, version: &str, details: &str) -> Result<()> {
        let event = LifecycleEvent::new(ForgeModule::Forge, "promoted", skill_id, details);
        let mut tx = self.pool.begin().await.map_err(ForgeError::storage)?;

        let result = sqlx::query(
            "UPDATE skills SET state = ?, current_version = ?, updated_at = ? WHERE skill_id = ?",
        )
        .bind(OptimizationState::Promoted.as_str())
        .bind(version)
        .bind(event.timestamp.to_rfc3339())
        .bind(skill_id)
        .execute(&mut *tx)
        .await
        .map_err(ForgeError::storage)?;

        if result.rows_affected() == 0 {
            return Err(ForgeError::UnknownSkill(skill_id.to_string()));
        }

        sqlx::query(
            r#"
            INSERT INTO events (timestamp, module, action, skill_id, details)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.timestamp.to_rfc3339())
        .bind(event.module.as_str())
        .bind(&event.action)
        .bind(&event.skill_id)
        .bind(&event.details)
        .execute(&mut *tx)
        .await
        .map_err(ForgeError::storage)?;

        tx.commit().await.map_err(ForgeError::storage)?;
        info!("Promoted {} to {}", skill_id, version);
        Ok(())
    }

    /// Version tag a newly optimized artifact would receive
    pub async fn next_version(&self, skill_id: &str) -> Result<String> {
        let current = self
            .skill_record(skill_id)
            .await?
            .map(|record| record.current_version)
            .unwrap_or_else(|| skillforge_types::DEFAULT_VERSION.to_string());
        Ok(next_version(&current))
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Up to `limit` most recent samples for a skill, oldest first
    pub async fn recent_runs(&self, skill_id: &str, limit: usize) -> Result<Vec<RunSample>> {
        let rows = sqlx::query(
            r#"
            SELECT seq, skill_id, elapsed_us, tokens_in, tokens_out, success, timestamp, version
            FROM runs
            WHERE skill_id = ?
            ORDER BY seq DESC
            LIMIT ?
            "#,
        )
        .bind(skill_id)
        .bind(to_i64(limit as u64))
        .fetch_all(&self.pool)
        .await
        .map_err(ForgeError::storage)?;

        let mut samples = self.parse_all(&rows, parse_run)?;
        samples.reverse();
        Ok(samples)
    }

    /// Aggregate over the configured window
    pub async fn aggregate(&self, skill_id: &str) -> Result<AggregateView> {
        self.aggregate_window(skill_id, self.window).await
    }

    /// Aggregate over the `window` most recent samples (by insertion order)
    pub async fn aggregate_window(&self, skill_id: &str, window: usize) -> Result<AggregateView> {
        let samples = self.recent_runs(skill_id, window).await?;
        Ok(aggregate_samples(skill_id, &samples))
    }

    /// Distinct skill ids seen in the run stream, by first appearance.
    ///
    /// Registered skills without runs are not listed.
    pub async fn list_known_skills(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT skill_id
            FROM runs
            GROUP BY skill_id
            ORDER BY MIN(seq)
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ForgeError::storage)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("skill_id"))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(ForgeError::storage)
    }

    /// Up to `limit` most recent events, newest first
    pub async fn recent_events(&self, limit: usize) -> Result<Vec<LifecycleEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT seq, timestamp, module, action, skill_id, details
            FROM events
            ORDER BY seq DESC
            LIMIT ?
            "#,
        )
        .bind(to_i64(limit as u64))
        .fetch_all(&self.pool)
        .await
        .map_err(ForgeError::storage)?;

        self.parse_all(&rows, parse_event)
    }

    /// Read-only snapshot for external consumers
    pub async fn export(&self) -> Result<DashboardExport> {
        let skill_ids = self.list_known_skills().await?;
        let mut skills = Vec::with_capacity(skill_ids.len());
        for skill_id in &skill_ids {
            skills.push(self.aggregate(skill_id).await?);
        }

        let events = self.recent_events(EXPORT_EVENT_LIMIT).await?;

        let savings: Vec<f64> = self
            .registered_skills()
            .await?
            .into_iter()
            .filter_map(|record| record.token_savings_pct)
            .collect();

        let total_runs = skills.iter().map(|s| s.total_runs).sum();
        let avg_runtime_ms = mean(skills.iter().map(|s| s.mean_elapsed_ms));
        let avg_token_savings_pct = mean(savings.iter().copied());

        Ok(DashboardExport {
            timestamp: Utc::now(),
            summary: ExportSummary {
                skills_tracked: skill_ids.len(),
                total_runs,
                avg_runtime_ms,
                avg_token_savings_pct,
                skipped_records: self.diagnostics().skipped_records,
            },
            skills,
            events,
        })
    }

    /// Counters describing what reads had to skip
    pub fn diagnostics(&self) -> LedgerDiagnostics {
        let skipped = self
            .skipped
            .lock()
            .map(|set| set.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len());
        LedgerDiagnostics {
            skipped_records: skipped as u64,
        }
    }

    /// Parse every row, skipping (and counting) malformed ones
    fn parse_all<T>(
        &self,
        rows: &[SqliteRow],
        parse: impl Fn(&SqliteRow) -> Result<T>,
    ) -> Result<Vec<T>> {
        let mut parsed = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(value) = self.keep_valid(parse(row))? {
                parsed.push(value);
            }
        }
        Ok(parsed)
    }

    /// Turn a malformed-record error into a logged skip; other errors propagate
    fn keep_valid<T>(&self, parsed: Result<T>) -> Result<Option<T>> {
        match parsed {
            Ok(value) => Ok(Some(value)),
            Err(ForgeError::MalformedRecord { table, seq, reason }) => {
                warn!("Skipping malformed record in '{}' (seq {}): {}", table, seq, reason);
                let mut skipped = self
                    .skipped
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                skipped.insert((table, seq));
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{raw}': {e}"))
}

fn non_negative(value: i64, column: &str) -> std::result::Result<u64, String> {
    u64::try_from(value).map_err(|_| format!("negative {column}: {value}"))
}

fn parse_run(row: &SqliteRow) -> Result<RunSample> {
    let seq: i64 = row.try_get("seq").map_err(ForgeError::storage)?;
    let malformed = |reason: String| ForgeError::MalformedRecord {
        table: "runs",
        seq,
        reason,
    };

    let elapsed_us: i64 = row.try_get("elapsed_us").map_err(|e| malformed(e.to_string()))?;
    let tokens_in: i64 = row.try_get("tokens_in").map_err(|e| malformed(e.to_string()))?;
    let tokens_out: i64 = row.try_get("tokens_out").map_err(|e| malformed(e.to_string()))?;
    let timestamp: String = row.try_get("timestamp").map_err(|e| malformed(e.to_string()))?;

    Ok(RunSample {
        skill_id: row.try_get("skill_id").map_err(|e| malformed(e.to_string()))?,
        elapsed: Duration::from_micros(non_negative(elapsed_us, "elapsed").map_err(malformed)?),
        tokens_in: non_negative(tokens_in, "tokens_in").map_err(malformed)?,
        tokens_out: non_negative(tokens_out, "tokens_out").map_err(malformed)?,
        success: row.try_get("success").map_err(|e| malformed(e.to_string()))?,
        timestamp: parse_timestamp(&timestamp).map_err(malformed)?,
        version: row.try_get("version").map_err(|e| malformed(e.to_string()))?,
    })
}

fn parse_event(row: &SqliteRow) -> Result<LifecycleEvent> {
    let seq: i64 = row.try_get("seq").map_err(ForgeError::storage)?;
    let malformed = |reason: String| ForgeError::MalformedRecord {
        table: "events",
        seq,
        reason,
    };

    let timestamp: String = row.try_get("timestamp").map_err(|e| malformed(e.to_string()))?;
    let module: String = row.try_get("module").map_err(|e| malformed(e.to_string()))?;

    Ok(LifecycleEvent {
        timestamp: parse_timestamp(&timestamp).map_err(malformed)?,
        module: module.parse::<ForgeModule>().map_err(malformed)?,
        action: row.try_get("action").map_err(|e| malformed(e.to_string()))?,
        skill_id: row.try_get("skill_id").map_err(|e| malformed(e.to_string()))?,
        details: row.try_get("details").map_err(|e| malformed(e.to_string()))?,
    })
}

fn parse_skill(row: &SqliteRow) -> Result<SkillRecord> {
    let seq: i64 = row.try_get("seq").map_err(ForgeError::storage)?;
    let malformed = |reason: String| ForgeError::MalformedRecord {
        table: "skills",
        seq,
        reason,
    };

    let state: String = row.try_get("state").map_err(|e| malformed(e.to_string()))?;
    let updated_at: String = row.try_get("updated_at").map_err(|e| malformed(e.to_string()))?;

    Ok(SkillRecord {
        skill_id: row.try_get("skill_id").map_err(|e| malformed(e.to_string()))?,
        locator: row.try_get("locator").map_err(|e| malformed(e.to_string()))?,
        current_version: row
            .try_get("current_version")
            .map_err(|e| malformed(e.to_string()))?,
        state: state.parse::<OptimizationState>().map_err(malformed)?,
        token_savings_pct: row
            .try_get("token_savings_pct")
            .map_err(|e| malformed(e.to_string()))?,
        updated_at: parse_timestamp(&updated_at).map_err(malformed)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_ledger(dir: &TempDir) -> Ledger {
        Ledger::open(dir.path().join("ledger.db")).await.unwrap()
    }

    #[tokio::test]
    async fn test_malformed_runs_are_skipped_and_counted() {
        let dir = TempDir::new().unwrap();
        let ledger = open_ledger(&dir).await;

        ledger
            .record_run(&RunSample::new("s", Duration::from_millis(100), 10, 5, true))
            .await
            .unwrap();

        sqlx::query(
            "INSERT INTO runs (skill_id, elapsed_us, tokens_in, tokens_out, success, timestamp, version) \
             VALUES ('s', 1000, 1, 1, 1, 'not-a-timestamp', 'v1')",
        )
        .execute(&ledger.pool)
        .await
        .unwrap();

        sqlx::query(
            "INSERT INTO runs (skill_id, elapsed_us, tokens_in, tokens_out, success, timestamp, version) \
             VALUES ('s', -5, 1, 1, 1, '2026-01-01T00:00:00Z', 'v1')",
        )
        .execute(&ledger.pool)
        .await
        .unwrap();

        let view = ledger.aggregate("s").await.unwrap();
        assert_eq!(view.total_runs, 1);
        assert_eq!(ledger.diagnostics().skipped_records, 2);

        // Re-reading the same rows does not inflate the count
        ledger.aggregate("s").await.unwrap();
        assert_eq!(ledger.diagnostics().skipped_records, 2);
    }

    #[tokio::test]
    async fn test_malformed_event_module_is_skipped() {
        let dir = TempDir::new().unwrap();
        let ledger = open_ledger(&dir).await;

        sqlx::query(
            "INSERT INTO events (timestamp, module, action, skill_id, details) \
             VALUES ('2026-01-01T00:00:00Z', 'dashboard', 'x', 's', '')",
        )
        .execute(&ledger.pool)
        .await
        .unwrap();
        ledger
            .record_event(&LifecycleEvent::new(ForgeModule::Profiler, "recorded", "s", "ok"))
            .await
            .unwrap();

        let events = ledger.recent_events(10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].module, ForgeModule::Profiler);

        let export = ledger.export().await.unwrap();
        assert_eq!(export.summary.skipped_records, 1);
    }

    #[test]
    fn test_mean_of_nothing_is_zero() {
        assert_eq!(mean(std::iter::empty()), 0.0);
        assert_eq!(mean([1.0, 3.0].into_iter()), 2.0);
    }
}
