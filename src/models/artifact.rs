use serde::{Deserialize, Serialize};

/// Opaque output of a sandbox execution, content-addressed by the sha256 of
/// its bytes. Never mutated; deleted only with its owning run.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Artifact {
    pub id: String,
    pub run_id: String,
    /// Run-level artifacts (e.g. the baseline trace) carry no proposal.
    pub proposal_id: Option<String>,
    pub artifact_type: ArtifactType,
    pub label: String,
    pub content: Vec<u8>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    Log,
    Trace,
    Bench,
    Diff,
    Baseline,
}

impl ArtifactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Trace => "trace",
            Self::Bench => "bench",
            Self::Diff => "diff",
            Self::Baseline => "baseline",
        }
    }
}

/// Artifact payload produced inside the validator, before it is attached to
/// a run (and possibly a proposal) and persisted.
#[derive(Debug, Clone)]
pub struct ArtifactDraft {
    pub artifact_type: ArtifactType,
    pub label: String,
    pub content: Vec<u8>,
}

impl ArtifactDraft {
    pub fn new(artifact_type: ArtifactType, label: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            artifact_type,
            label: label.into(),
            content,
        }
    }
}
