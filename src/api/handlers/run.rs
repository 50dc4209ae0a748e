use crate::api::dto::run::{
    ArtifactResponse, ArtifactsListResponse, CancelRunResponse, CandidateResponse,
    CandidatesListResponse, EventResponse, EventsListResponse, OpportunitiesListResponse,
    OpportunityResponse, ProposalResponse, ProposalsListResponse, RunResponse, RunsListResponse,
    StartRunRequest, ValidationResponse, ValidationsListResponse,
};
use crate::api::routes::AppState;
use crate::error::{AppError, Result};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};

pub async fn start_run(
    State(state): State<AppState>,
    Json(req): Json<StartRunRequest>,
) -> Result<(StatusCode, Json<RunResponse>)> {
    if req.repo_id.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "'repo_id' must not be empty".to_string(),
        ));
    }

    let run = state
        .orchestrator
        .start_run(&req.repo_id, req.sha.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(RunResponse::from(run))))
}

pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RunResponse>> {
    let run = state.store.runs.get(&id).await?;
    Ok(Json(RunResponse::from(run)))
}

pub async fn list_runs(
    State(state): State<AppState>,
    Query(params): Query<std::collections::HashMap<String, String>>,
) -> Result<Json<RunsListResponse>> {
    let runs = match params.get("repo_id") {
        Some(repo_id) => state.store.runs.list_for_repo(repo_id).await?,
        None => state.store.runs.list_all().await?,
    };
    let response = RunsListResponse {
        data: runs.into_iter().map(RunResponse::from).collect(),
    };
    Ok(Json(response))
}

pub async fn cancel_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CancelRunResponse>> {
    let cancelled = state.orchestrator.cancel_run(&id).await?;
    Ok(Json(CancelRunResponse { cancelled }))
}

/// Incremental event poll: `?after=N` returns events with sequence > N;
/// omitting it returns the full log.
pub async fn list_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<std::collections::HashMap<String, String>>,
) -> Result<Json<EventsListResponse>> {
    state.store.runs.get(&id).await?;

    let after = match params.get("after") {
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|_| AppError::InvalidRequest(format!("invalid 'after' value '{}'", raw)))?,
        None => -1,
    };

    let events = state.store.events.list_after(&id, after).await?;
    let response = EventsListResponse {
        data: events.into_iter().map(EventResponse::from).collect(),
    };
    Ok(Json(response))
}

pub async fn list_opportunities(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OpportunitiesListResponse>> {
    state.store.runs.get(&id).await?;

    let opportunities = state.store.findings.list_opportunities(&id).await?;
    let response = OpportunitiesListResponse {
        data: opportunities
            .into_iter()
            .map(OpportunityResponse::from)
            .collect(),
    };
    Ok(Json(response))
}

pub async fn list_candidates(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CandidatesListResponse>> {
    state.store.runs.get(&id).await?;

    let candidates = state.store.findings.list_candidates(&id).await?;
    let response = CandidatesListResponse {
        data: candidates.into_iter().map(CandidateResponse::from).collect(),
    };
    Ok(Json(response))
}

pub async fn list_validations(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ValidationsListResponse>> {
    state.store.runs.get(&id).await?;

    let validations = state.store.findings.list_validations(&id).await?;
    let response = ValidationsListResponse {
        data: validations
            .into_iter()
            .map(ValidationResponse::from)
            .collect(),
    };
    Ok(Json(response))
}

pub async fn list_proposals(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProposalsListResponse>> {
    state.store.runs.get(&id).await?;

    let proposals = state.store.proposals.list_for_run(&id).await?;
    let response = ProposalsListResponse {
        data: proposals.into_iter().map(ProposalResponse::from).collect(),
    };
    Ok(Json(response))
}

pub async fn list_artifacts(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ArtifactsListResponse>> {
    state.store.runs.get(&id).await?;

    let artifacts = state.store.artifacts.list_for_run(&id).await?;
    let response = ArtifactsListResponse {
        data: artifacts.into_iter().map(ArtifactResponse::from).collect(),
    };
    Ok(Json(response))
}

pub async fn get_artifact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let artifact = state.store.artifacts.get(&id).await?;
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        artifact.content,
    ))
}
