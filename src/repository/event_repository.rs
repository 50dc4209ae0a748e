use crate::error::Result;
use crate::models::{Event, EventKind};
use crate::repository::DbPool;
use chrono::Utc;

#[derive(Clone)]
pub struct EventRepository {
    pool: DbPool,
}

impl EventRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Appends one event with the next sequence number for the run. The
    /// sequence read and the insert share a transaction, which keeps the
    /// per-run sequence gapless and strictly increasing. The orchestrator
    /// is the only writer, so this never contends with itself.
    pub async fn append(
        &self,
        run_id: &str,
        kind: EventKind,
        payload: serde_json::Value,
    ) -> Result<Event> {
        let mut tx = self.pool.begin().await?;

        let next: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(sequence) + 1, 0) FROM events WHERE run_id = ?",
        )
        .bind(run_id)
        .fetch_one(&mut *tx)
        .await?;

        let event = Event {
            run_id: run_id.to_string(),
            sequence: next,
            kind,
            payload: payload.to_string(),
            timestamp: Utc::now().timestamp_millis(),
        };

        sqlx::query(
            r#"
            INSERT INTO events (run_id, sequence, kind, payload, timestamp)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.run_id)
        .bind(event.sequence)
        .bind(event.kind)
        .bind(&event.payload)
        .bind(event.timestamp)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(event)
    }

    /// Events with `sequence > after`, ascending. `after = -1` returns the
    /// full log.
    pub async fn list_after(&self, run_id: &str, after: i64) -> Result<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(
            r#"
            SELECT run_id, sequence, kind, payload, timestamp
            FROM events
            WHERE run_id = ? AND sequence > ?
            ORDER BY sequence ASC
            "#,
        )
        .bind(run_id)
        .bind(after)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{DbPool, establish_connection};
    use serde_json::json;

    async fn pool_with_runs(run_ids: &[&str]) -> DbPool {
        let pool = establish_connection("sqlite::memory:").await.unwrap();
        sqlx::query(
            r#"
            INSERT INTO repos (id, name, default_branch, package_manager, source_root,
                               build_cmd, test_cmd, created_at)
            VALUES ('r1', 'demo', 'main', 'npm', '/tmp/demo', 'true', 'true', 0)
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();
        for run_id in run_ids {
            sqlx::query("INSERT INTO runs (id, repo_id, status, created_at) VALUES (?, 'r1', 'queued', 0)")
                .bind(run_id)
                .execute(&pool)
                .await
                .unwrap();
        }
        pool
    }

    #[tokio::test]
    async fn sequences_are_gapless_and_per_run() {
        let pool = pool_with_runs(&["run-a", "run-b"]).await;
        let events = EventRepository::new(pool);

        for i in 0..5 {
            let e = events
                .append("run-a", EventKind::OpportunityFound, json!({ "i": i }))
                .await
                .unwrap();
            assert_eq!(e.sequence, i);
        }

        let e = events
            .append("run-b", EventKind::PhaseTransition, json!({}))
            .await
            .unwrap();
        assert_eq!(e.sequence, 0);

        let listed = events.list_after("run-a", -1).await.unwrap();
        let sequences: Vec<i64> = listed.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn list_after_filters_by_sequence() {
        let pool = pool_with_runs(&["run-a"]).await;
        let events = EventRepository::new(pool);

        for _ in 0..4 {
            events
                .append("run-a", EventKind::CandidateTested, json!({}))
                .await
                .unwrap();
        }

        let tail = events.list_after("run-a", 1).await.unwrap();
        let sequences: Vec<i64> = tail.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![2, 3]);
    }
}
