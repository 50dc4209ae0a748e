use super::rfc3339;
use crate::models::{
    Artifact, Candidate, Event, EventKind, Opportunity, Proposal, ProposalStatus, Run,
    ValidationResult,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct StartRunRequest {
    pub repo_id: String,
    pub sha: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub id: String,
    pub repo_id: String,
    pub sha: Option<String>,
    pub status: String,
    pub opportunities_found: i64,
    pub approaches_tested: i64,
    pub candidates_validated: i64,
    pub candidates_accepted: i64,
    pub compute_minutes: Option<f64>,
    pub failure_reason: Option<String>,
    pub created_at: String,
    pub finished_at: Option<String>,
}

impl From<Run> for RunResponse {
    fn from(run: Run) -> Self {
        Self {
            id: run.id,
            repo_id: run.repo_id,
            sha: run.sha,
            status: run.status.as_str().to_string(),
            opportunities_found: run.opportunities_found,
            approaches_tested: run.approaches_tested,
            candidates_validated: run.candidates_validated,
            candidates_accepted: run.candidates_accepted,
            compute_minutes: run.compute_minutes,
            failure_reason: run.failure_reason,
            created_at: rfc3339(run.created_at),
            finished_at: run.finished_at.map(rfc3339),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunsListResponse {
    pub data: Vec<RunResponse>,
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub sequence: i64,
    pub kind: EventKind,
    pub payload: Value,
    pub timestamp: String,
}

impl From<Event> for EventResponse {
    fn from(event: Event) -> Self {
        let payload = event.payload_json();
        Self {
            sequence: event.sequence,
            kind: event.kind,
            payload,
            timestamp: rfc3339(event.timestamp),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EventsListResponse {
    pub data: Vec<EventResponse>,
}

#[derive(Debug, Serialize)]
pub struct CancelRunResponse {
    pub cancelled: bool,
}

#[derive(Debug, Serialize)]
pub struct ProposalResponse {
    pub id: String,
    pub run_id: String,
    pub candidate_id: String,
    pub diff: String,
    pub rationale: String,
    pub status: ProposalStatus,
    pub created_at: String,
}

impl From<Proposal> for ProposalResponse {
    fn from(proposal: Proposal) -> Self {
        Self {
            id: proposal.id,
            run_id: proposal.run_id,
            candidate_id: proposal.candidate_id,
            diff: proposal.diff,
            rationale: proposal.rationale,
            status: proposal.status,
            created_at: rfc3339(proposal.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProposalsListResponse {
    pub data: Vec<ProposalResponse>,
}

#[derive(Debug, Serialize)]
pub struct OpportunityResponse {
    pub id: String,
    pub pattern_kind: String,
    pub file_path: String,
    pub start_line: i64,
    pub start_col: i64,
    pub end_line: i64,
    pub end_col: i64,
    pub confidence: f64,
    pub snippet: String,
}

impl From<Opportunity> for OpportunityResponse {
    fn from(opportunity: Opportunity) -> Self {
        Self {
            id: opportunity.id,
            pattern_kind: opportunity.pattern_kind.as_str().to_string(),
            file_path: opportunity.file_path,
            start_line: opportunity.start_line,
            start_col: opportunity.start_col,
            end_line: opportunity.end_line,
            end_col: opportunity.end_col,
            confidence: opportunity.confidence,
            snippet: opportunity.snippet,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OpportunitiesListResponse {
    pub data: Vec<OpportunityResponse>,
}

#[derive(Debug, Serialize)]
pub struct CandidateResponse {
    pub id: String,
    pub opportunity_id: String,
    pub diff: String,
    pub rationale: String,
}

impl From<Candidate> for CandidateResponse {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id,
            opportunity_id: candidate.opportunity_id,
            diff: candidate.diff,
            rationale: candidate.rationale,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CandidatesListResponse {
    pub data: Vec<CandidateResponse>,
}

#[derive(Debug, Serialize)]
pub struct ValidationResponse {
    pub id: String,
    pub candidate_id: String,
    pub verdict: String,
    pub baseline_wall_ms: Option<f64>,
    pub candidate_wall_ms: Option<f64>,
    pub delta: Option<f64>,
    pub detail: Option<String>,
}

impl From<ValidationResult> for ValidationResponse {
    fn from(result: ValidationResult) -> Self {
        Self {
            id: result.id,
            candidate_id: result.candidate_id,
            verdict: result.verdict.as_str().to_string(),
            baseline_wall_ms: result.baseline_wall_ms,
            candidate_wall_ms: result.candidate_wall_ms,
            delta: result.delta,
            detail: result.detail,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ValidationsListResponse {
    pub data: Vec<ValidationResponse>,
}

/// Artifact metadata only; content is fetched by id through its own
/// endpoint since it may be binary and large.
#[derive(Debug, Serialize)]
pub struct ArtifactResponse {
    pub id: String,
    pub proposal_id: Option<String>,
    pub artifact_type: String,
    pub label: String,
    pub size_bytes: usize,
    pub created_at: String,
}

impl From<Artifact> for ArtifactResponse {
    fn from(artifact: Artifact) -> Self {
        Self {
            id: artifact.id,
            proposal_id: artifact.proposal_id,
            artifact_type: artifact.artifact_type.as_str().to_string(),
            label: artifact.label,
            size_bytes: artifact.content.len(),
            created_at: rfc3339(artifact.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ArtifactsListResponse {
    pub data: Vec<ArtifactResponse>,
}
