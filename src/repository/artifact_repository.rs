use crate::error::{AppError, Result};
use crate::models::{Artifact, ArtifactDraft};
use crate::repository::DbPool;
use chrono::Utc;
use sha2::{Digest, Sha256};

#[derive(Clone)]
pub struct ArtifactRepository {
    pool: DbPool,
}

impl ArtifactRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Content-addressable put: the artifact id is the sha256 of its bytes.
    /// Re-putting identical content under the same run is a no-op.
    pub async fn put(
        &self,
        run_id: &str,
        proposal_id: Option<&str>,
        draft: ArtifactDraft,
    ) -> Result<Artifact> {
        let digest = Sha256::digest(&draft.content);
        let id = format!("{:x}", digest);

        let artifact = Artifact {
            id: id.clone(),
            run_id: run_id.to_string(),
            proposal_id: proposal_id.map(str::to_string),
            artifact_type: draft.artifact_type,
            label: draft.label,
            content: draft.content,
            created_at: Utc::now().timestamp_millis(),
        };

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO artifacts
                (id, run_id, proposal_id, artifact_type, label, content, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&artifact.id)
        .bind(&artifact.run_id)
        .bind(&artifact.proposal_id)
        .bind(artifact.artifact_type)
        .bind(&artifact.label)
        .bind(&artifact.content)
        .bind(artifact.created_at)
        .execute(&self.pool)
        .await?;

        Ok(artifact)
    }

    pub async fn get(&self, id: &str) -> Result<Artifact> {
        let artifact = sqlx::query_as::<_, Artifact>("SELECT * FROM artifacts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::ArtifactNotFound(id.to_string()))?;

        Ok(artifact)
    }

    pub async fn list_for_run(&self, run_id: &str) -> Result<Vec<Artifact>> {
        let artifacts = sqlx::query_as::<_, Artifact>(
            "SELECT * FROM artifacts WHERE run_id = ? ORDER BY created_at ASC",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArtifactType;
    use crate::repository::establish_connection;

    #[tokio::test]
    async fn artifact_id_is_content_hash() {
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
        sqlx::query("INSERT INTO runs (id, repo_id, status, created_at) VALUES ('run-1', 'r1', 'queued', 0)")
            .execute(&pool)
            .await
            .unwrap();
        let artifacts = ArtifactRepository::new(pool);

        let draft = ArtifactDraft::new(ArtifactType::Log, "build.log", b"hello".to_vec());
        let stored = artifacts.put("run-1", None, draft).await.unwrap();

        // sha256("hello")
        assert_eq!(
            stored.id,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert!(stored.proposal_id.is_none());

        let fetched = artifacts.get(&stored.id).await.unwrap();
        assert_eq!(fetched.content, b"hello");
    }
}
