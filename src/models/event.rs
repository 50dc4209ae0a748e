use serde::{Deserialize, Serialize};

/// Append-only record of a state change within a run. Sequences are per-run,
/// start at 0, and are gapless and strictly increasing.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub run_id: String,
    pub sequence: i64,
    pub kind: EventKind,
    /// JSON payload, stored as text.
    pub payload: String,
    pub timestamp: i64,
}

impl Event {
    pub fn payload_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.payload).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    PhaseTransition,
    OpportunityFound,
    CandidateTested,
    CandidateAccepted,
    CandidateRejected,
    RunCompleted,
    RunFailed,
    RunCancelled,
}
