use crate::repository::DbPool;
use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;

pub async fn establish_connection(database_url: &str) -> Result<DbPool> {
    // Ensure the database URL has the correct format
    let db_url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{}", database_url)
    };

    // An in-memory database exists per connection; restrict the pool to one
    // so every caller sees the same schema.
    let pool = if db_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&db_url)
            .await?
    } else {
        let connection_string = format!("{}?mode=rwc", db_url);
        sqlx::SqlitePool::connect(&connection_string).await?
    };

    // Run migrations
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS repos (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            default_branch TEXT NOT NULL,
            package_manager TEXT NOT NULL,
            source_root TEXT NOT NULL,
            build_cmd TEXT NOT NULL,
            test_cmd TEXT NOT NULL,
            bench_cmd TEXT,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS runs (
            id TEXT PRIMARY KEY,
            repo_id TEXT NOT NULL,
            sha TEXT,
            status TEXT NOT NULL,
            opportunities_found INTEGER NOT NULL DEFAULT 0,
            approaches_tested INTEGER NOT NULL DEFAULT 0,
            candidates_validated INTEGER NOT NULL DEFAULT 0,
            candidates_accepted INTEGER NOT NULL DEFAULT 0,
            compute_minutes REAL,
            failure_reason TEXT,
            created_at INTEGER NOT NULL,
            finished_at INTEGER,
            FOREIGN KEY (repo_id) REFERENCES repos(id)
        );

        CREATE TABLE IF NOT EXISTS events (
            run_id TEXT NOT NULL,
            sequence INTEGER NOT NULL,
            kind TEXT NOT NULL,
            payload TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            PRIMARY KEY (run_id, sequence),
            FOREIGN KEY (run_id) REFERENCES runs(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS opportunities (
            id TEXT PRIMARY KEY,
            run_id TEXT NOT NULL,
            pattern_kind TEXT NOT NULL,
            file_path TEXT NOT NULL,
            start_line INTEGER NOT NULL,
            start_col INTEGER NOT NULL,
            end_line INTEGER NOT NULL,
            end_col INTEGER NOT NULL,
            confidence REAL NOT NULL,
            snippet TEXT NOT NULL,
            FOREIGN KEY (run_id) REFERENCES runs(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS candidates (
            id TEXT PRIMARY KEY,
            run_id TEXT NOT NULL,
            opportunity_id TEXT NOT NULL,
            diff TEXT NOT NULL,
            rationale TEXT NOT NULL,
            FOREIGN KEY (run_id) REFERENCES runs(id) ON DELETE CASCADE,
            FOREIGN KEY (opportunity_id) REFERENCES opportunities(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS validations (
            id TEXT PRIMARY KEY,
            candidate_id TEXT NOT NULL,
            verdict TEXT NOT NULL,
            baseline_wall_ms REAL,
            candidate_wall_ms REAL,
            delta REAL,
            detail TEXT,
            FOREIGN KEY (candidate_id) REFERENCES candidates(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS proposals (
            id TEXT PRIMARY KEY,
            run_id TEXT NOT NULL,
            candidate_id TEXT NOT NULL,
            diff TEXT NOT NULL,
            rationale TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (run_id) REFERENCES runs(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS artifacts (
            id TEXT PRIMARY KEY,
            run_id TEXT NOT NULL,
            proposal_id TEXT,
            artifact_type TEXT NOT NULL,
            label TEXT NOT NULL,
            content BLOB NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (run_id) REFERENCES runs(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_runs_repo_id ON runs(repo_id);
        CREATE INDEX IF NOT EXISTS idx_runs_status ON runs(status);
        CREATE INDEX IF NOT EXISTS idx_events_run_id ON events(run_id);
        CREATE INDEX IF NOT EXISTS idx_opportunities_run_id ON opportunities(run_id);
        CREATE INDEX IF NOT EXISTS idx_candidates_run_id ON candidates(run_id);
        CREATE INDEX IF NOT EXISTS idx_proposals_run_id ON proposals(run_id);
        CREATE INDEX IF NOT EXISTS idx_artifacts_run_id ON artifacts(run_id);
        "#,
    )
    .execute(&pool)
    .await?;

    Ok(pool)
}
