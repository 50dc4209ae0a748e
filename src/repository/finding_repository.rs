use crate::error::Result;
use crate::models::{Candidate, Opportunity, ValidationResult, Verdict};
use crate::repository::DbPool;

/// Persists what a run discovers: opportunities, the candidates generated
/// for them and the validation verdicts. Rows are written once and never
/// mutated, which keeps mid-flight queries consistent.
#[derive(Clone)]
pub struct FindingRepository {
    pool: DbPool,
}

impl FindingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert_opportunity(&self, opportunity: &Opportunity) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO opportunities
                (id, run_id, pattern_kind, file_path, start_line, start_col,
                 end_line, end_col, confidence, snippet)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&opportunity.id)
        .bind(&opportunity.run_id)
        .bind(opportunity.pattern_kind)
        .bind(&opportunity.file_path)
        .bind(opportunity.start_line)
        .bind(opportunity.start_col)
        .bind(opportunity.end_line)
        .bind(opportunity.end_col)
        .bind(opportunity.confidence)
        .bind(&opportunity.snippet)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_opportunities(&self, run_id: &str) -> Result<Vec<Opportunity>> {
        let rows = sqlx::query_as::<_, Opportunity>(
            "SELECT * FROM opportunities WHERE run_id = ? ORDER BY file_path, start_line",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn insert_candidate(&self, candidate: &Candidate) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO candidates (id, run_id, opportunity_id, diff, rationale)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&candidate.id)
        .bind(&candidate.run_id)
        .bind(&candidate.opportunity_id)
        .bind(&candidate.diff)
        .bind(&candidate.rationale)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_candidates(&self, run_id: &str) -> Result<Vec<Candidate>> {
        let rows =
            sqlx::query_as::<_, Candidate>("SELECT * FROM candidates WHERE run_id = ?")
                .bind(run_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows)
    }

    pub async fn record_validation(
        &self,
        candidate_id: &str,
        verdict: Verdict,
        baseline_wall_ms: Option<f64>,
        candidate_wall_ms: Option<f64>,
        delta: Option<f64>,
        detail: Option<&str>,
    ) -> Result<ValidationResult> {
        let result = ValidationResult {
            id: uuid::Uuid::new_v4().to_string(),
            candidate_id: candidate_id.to_string(),
            verdict,
            baseline_wall_ms,
            candidate_wall_ms,
            delta,
            detail: detail.map(str::to_string),
        };

        sqlx::query(
            r#"
            INSERT INTO validations
                (id, candidate_id, verdict, baseline_wall_ms, candidate_wall_ms, delta, detail)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&result.id)
        .bind(&result.candidate_id)
        .bind(result.verdict)
        .bind(result.baseline_wall_ms)
        .bind(result.candidate_wall_ms)
        .bind(result.delta)
        .bind(&result.detail)
        .execute(&self.pool)
        .await?;

        Ok(result)
    }

    pub async fn list_validations(&self, run_id: &str) -> Result<Vec<ValidationResult>> {
        let rows = sqlx::query_as::<_, ValidationResult>(
            r#"
            SELECT v.* FROM validations v
            JOIN candidates c ON c.id = v.candidate_id
            WHERE c.run_id = ?
            "#,
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
