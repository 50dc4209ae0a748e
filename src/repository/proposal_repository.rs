use crate::error::Result;
use crate::models::{Candidate, Proposal, ProposalStatus};
use crate::repository::DbPool;
use chrono::Utc;

#[derive(Clone)]
pub struct ProposalRepository {
    pool: DbPool,
}

impl ProposalRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Promotes an accepted candidate. The proposal carries the candidate's
    /// diff byte-for-byte.
    pub async fn create(&self, candidate: &Candidate) -> Result<Proposal> {
        let proposal = Proposal {
            id: uuid::Uuid::new_v4().to_string(),
            run_id: candidate.run_id.clone(),
            candidate_id: candidate.id.clone(),
            diff: candidate.diff.clone(),
            rationale: candidate.rationale.clone(),
            status: ProposalStatus::Pending,
            created_at: Utc::now().timestamp_millis(),
        };

        sqlx::query(
            r#"
            INSERT INTO proposals (id, run_id, candidate_id, diff, rationale, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&proposal.id)
        .bind(&proposal.run_id)
        .bind(&proposal.candidate_id)
        .bind(&proposal.diff)
        .bind(&proposal.rationale)
        .bind(proposal.status)
        .bind(proposal.created_at)
        .execute(&self.pool)
        .await?;

        Ok(proposal)
    }

    pub async fn list_for_run(&self, run_id: &str) -> Result<Vec<Proposal>> {
        let proposals = sqlx::query_as::<_, Proposal>(
            "SELECT * FROM proposals WHERE run_id = ? ORDER BY created_at ASC",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(proposals)
    }
}
