use serde::{Deserialize, Serialize};

/// One optimization pass over a repository at a given commit.
///
/// Mutated only by the orchestrator; immutable once a terminal status is
/// reached.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Run {
    pub id: String,
    pub repo_id: String,
    pub sha: Option<String>,
    pub status: RunStatus,
    pub opportunities_found: i64,
    pub approaches_tested: i64,
    pub candidates_validated: i64,
    pub candidates_accepted: i64,
    pub compute_minutes: Option<f64>,
    pub failure_reason: Option<String>,
    pub created_at: i64,
    pub finished_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Queued,
    Scanning,
    Generating,
    Testing,
    Validating,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Scanning => "scanning",
            Self::Generating => "generating",
            Self::Testing => "testing",
            Self::Validating => "validating",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(RunStatus::Succeeded.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
        assert!(!RunStatus::Queued.is_terminal());
        assert!(!RunStatus::Validating.is_terminal());
    }
}
