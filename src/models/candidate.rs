use serde::{Deserialize, Serialize};

/// A proposed fix for one opportunity: a unified diff plus the reasoning
/// behind it. Immutable once generated; 0..N may exist per opportunity.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Candidate {
    pub id: String,
    pub run_id: String,
    pub opportunity_id: String,
    pub diff: String,
    pub rationale: String,
}

/// Outcome of sandboxing one candidate.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ValidationResult {
    pub id: String,
    pub candidate_id: String,
    pub verdict: Verdict,
    pub baseline_wall_ms: Option<f64>,
    pub candidate_wall_ms: Option<f64>,
    pub delta: Option<f64>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    Failed,
    Errored,
    TimedOut,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Errored => "errored",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Benchmark measurement for one side (baseline or candidate) of a
/// comparison. Wall time is the mean over `samples` runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BenchMetrics {
    pub wall_ms: f64,
    pub samples: u32,
}

impl BenchMetrics {
    /// Relative improvement of `candidate` over this baseline. Positive
    /// means the candidate is faster.
    pub fn delta_against(&self, candidate: &BenchMetrics) -> f64 {
        if self.wall_ms <= 0.0 {
            return 0.0;
        }
        (self.wall_ms - candidate.wall_ms) / self.wall_ms
    }
}
