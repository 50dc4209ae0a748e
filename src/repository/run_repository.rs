use crate::error::{AppError, Result};
use crate::models::{Run, RunStatus};
use crate::repository::DbPool;
use chrono::Utc;

#[derive(Clone)]
pub struct RunRepository {
    pool: DbPool,
}

impl RunRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Creates a run for `repo_id`, enforcing the single-active-run
    /// constraint. The existence check and the insert share one transaction
    /// so a concurrent request can never slip a second non-terminal run in.
    pub async fn create(&self, repo_id: &str, sha: Option<&str>) -> Result<Run> {
        let mut tx = self.pool.begin().await?;

        let active: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM runs
            WHERE repo_id = ? AND status NOT IN ('succeeded', 'failed', 'cancelled')
            "#,
        )
        .bind(repo_id)
        .fetch_one(&mut *tx)
        .await?;

        if active > 0 {
            return Err(AppError::RunConflict(repo_id.to_string()));
        }

        let run = Run {
            id: uuid::Uuid::new_v4().to_string(),
            repo_id: repo_id.to_string(),
            sha: sha.map(str::to_string),
            status: RunStatus::Queued,
            opportunities_found: 0,
            approaches_tested: 0,
            candidates_validated: 0,
            candidates_accepted: 0,
            compute_minutes: None,
            failure_reason: None,
            created_at: Utc::now().timestamp_millis(),
            finished_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO runs (id, repo_id, sha, status, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.id)
        .bind(&run.repo_id)
        .bind(&run.sha)
        .bind(run.status)
        .bind(run.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(run)
    }

    pub async fn get(&self, id: &str) -> Result<Run> {
        let run = sqlx::query_as::<_, Run>("SELECT * FROM runs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::RunNotFound(id.to_string()))?;

        Ok(run)
    }

    pub async fn list_for_repo(&self, repo_id: &str) -> Result<Vec<Run>> {
        let runs = sqlx::query_as::<_, Run>(
            "SELECT * FROM runs WHERE repo_id = ? ORDER BY created_at DESC",
        )
        .bind(repo_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(runs)
    }

    pub async fn list_all(&self) -> Result<Vec<Run>> {
        let runs = sqlx::query_as::<_, Run>("SELECT * FROM runs ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;

        Ok(runs)
    }

    pub async fn update_status(&self, id: &str, status: RunStatus) -> Result<()> {
        sqlx::query("UPDATE runs SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn set_sha(&self, id: &str, sha: &str) -> Result<()> {
        sqlx::query("UPDATE runs SET sha = ? WHERE id = ?")
            .bind(sha)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Terminal transition: records status, compute minutes and an optional
    /// failure reason in one statement. The guard makes the transition
    /// exactly-once: a run that already reached a terminal status is left
    /// untouched and `false` comes back, so two racing finalizers cannot
    /// both win.
    pub async fn finish(
        &self,
        id: &str,
        status: RunStatus,
        compute_minutes: f64,
        failure_reason: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE runs
            SET status = ?, compute_minutes = ?, failure_reason = ?, finished_at = ?
            WHERE id = ? AND status NOT IN ('succeeded', 'failed', 'cancelled')
            "#,
        )
        .bind(status)
        .bind(compute_minutes)
        .bind(failure_reason)
        .bind(Utc::now().timestamp_millis())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Counter increments are single UPDATE statements so they stay atomic
    /// with respect to concurrent candidate completions.
    pub async fn increment_counter(&self, id: &str, counter: RunCounter, by: i64) -> Result<()> {
        let sql = match counter {
            RunCounter::OpportunitiesFound => {
                "UPDATE runs SET opportunities_found = opportunities_found + ? WHERE id = ?"
            }
            RunCounter::ApproachesTested => {
                "UPDATE runs SET approaches_tested = approaches_tested + ? WHERE id = ?"
            }
            RunCounter::CandidatesValidated => {
                "UPDATE runs SET candidates_validated = candidates_validated + ? WHERE id = ?"
            }
            RunCounter::CandidatesAccepted => {
                "UPDATE runs SET candidates_accepted = candidates_accepted + ? WHERE id = ?"
            }
        };

        sqlx::query(sql).bind(by).bind(id).execute(&self.pool).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum RunCounter {
    OpportunitiesFound,
    ApproachesTested,
    CandidatesValidated,
    CandidatesAccepted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::establish_connection;

    async fn pool_with_repo() -> (DbPool, String) {
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
        (pool, "r1".to_string())
    }

    #[tokio::test]
    async fn second_active_run_conflicts() {
        let (pool, repo_id) = pool_with_repo().await;
        let repo = RunRepository::new(pool);

        let first = repo.create(&repo_id, None).await.unwrap();
        assert_eq!(first.status, RunStatus::Queued);

        let err = repo.create(&repo_id, None).await.unwrap_err();
        assert!(matches!(err, AppError::RunConflict(_)));

        // Conflict must not create a row.
        assert_eq!(repo.list_for_repo(&repo_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn terminal_run_frees_the_slot() {
        let (pool, repo_id) = pool_with_repo().await;
        let repo = RunRepository::new(pool);

        let first = repo.create(&repo_id, None).await.unwrap();
        repo.finish(&first.id, RunStatus::Succeeded, 0.1, None)
            .await
            .unwrap();

        let second = repo.create(&repo_id, Some("abc123")).await.unwrap();
        assert_eq!(second.sha.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn terminal_status_is_immutable() {
        let (pool, repo_id) = pool_with_repo().await;
        let repo = RunRepository::new(pool);

        let run = repo.create(&repo_id, None).await.unwrap();
        let finished = repo
            .finish(&run.id, RunStatus::Succeeded, 0.1, None)
            .await
            .unwrap();
        assert!(finished);

        // A late finalizer must lose: the run keeps its first terminal
        // status.
        let finished = repo
            .finish(&run.id, RunStatus::Cancelled, 0.2, None)
            .await
            .unwrap();
        assert!(!finished);

        let run = repo.get(&run.id).await.unwrap();
        assert_eq!(run.status, RunStatus::Succeeded);
    }

    #[tokio::test]
    async fn counters_accumulate() {
        let (pool, repo_id) = pool_with_repo().await;
        let repo = RunRepository::new(pool);

        let run = repo.create(&repo_id, None).await.unwrap();
        repo.increment_counter(&run.id, RunCounter::OpportunitiesFound, 3)
            .await
            .unwrap();
        repo.increment_counter(&run.id, RunCounter::CandidatesValidated, 1)
            .await
            .unwrap();
        repo.increment_counter(&run.id, RunCounter::CandidatesValidated, 1)
            .await
            .unwrap();

        let run = repo.get(&run.id).await.unwrap();
        assert_eq!(run.opportunities_found, 3);
        assert_eq!(run.candidates_validated, 2);
        assert_eq!(run.candidates_accepted, 0);
    }
}
