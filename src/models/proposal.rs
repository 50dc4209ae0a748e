use serde::{Deserialize, Serialize};

/// An accepted candidate promoted for human review. The engine creates and
/// reads proposals; review status is mutated by external collaborators.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Proposal {
    pub id: String,
    pub run_id: String,
    pub candidate_id: String,
    pub diff: String,
    pub rationale: String,
    pub status: ProposalStatus,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
    Merged,
}
