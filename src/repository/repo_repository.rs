use crate::error::{AppError, Result};
use crate::models::RepoProfile;
use crate::repository::DbPool;

#[derive(Clone)]
pub struct RepoRepository {
    pool: DbPool,
}

impl RepoRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, repo: &RepoProfile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO repos (id, name, default_branch, package_manager, source_root,
                               build_cmd, test_cmd, bench_cmd, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                default_branch = excluded.default_branch,
                package_manager = excluded.package_manager,
                source_root = excluded.source_root,
                build_cmd = excluded.build_cmd,
                test_cmd = excluded.test_cmd,
                bench_cmd = excluded.bench_cmd
            "#,
        )
        .bind(&repo.id)
        .bind(&repo.name)
        .bind(&repo.default_branch)
        .bind(&repo.package_manager)
        .bind(&repo.source_root)
        .bind(&repo.build_cmd)
        .bind(&repo.test_cmd)
        .bind(&repo.bench_cmd)
        .bind(repo.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<RepoProfile> {
        let repo = sqlx::query_as::<_, RepoProfile>("SELECT * FROM repos WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::RepoNotFound(id.to_string()))?;

        Ok(repo)
    }

    pub async fn list(&self) -> Result<Vec<RepoProfile>> {
        let repos = sqlx::query_as::<_, RepoProfile>("SELECT * FROM repos ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(repos)
    }
}
