//! Ledger schema
//!
//! `seq` columns carry the insertion order, which is the ledger's only
//! ordering guarantee. Rows are never updated or deleted in `runs` and `events`.

pub(crate) const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS runs (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        skill_id TEXT NOT NULL,
        elapsed_us INTEGER NOT NULL,
        tokens_in INTEGER NOT NULL,
        tokens_out INTEGER NOT NULL,
        success INTEGER NOT NULL,
        timestamp TEXT NOT NULL,
        version TEXT NOT NULL DEFAULT 'v1'
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_runs_skill_seq ON runs(skill_id, seq)",
    r#"
    CREATE TABLE IF NOT EXISTS events (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL,
        module TEXT NOT NULL,
        action TEXT NOT NULL,
        skill_id TEXT NOT NULL,
        details TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS skills (
        skill_id TEXT PRIMARY KEY,
        locator TEXT NOT NULL,
        current_version TEXT NOT NULL DEFAULT 'v1',
        state TEXT NOT NULL DEFAULT 'pending',
        token_savings_pct REAL,
        updated_at TEXT NOT NULL
    )
    "#,
];
