use crate::api::dto::repo::{RegisterRepoRequest, RepoResponse, ReposListResponse};
use crate::api::routes::AppState;
use crate::error::{AppError, Result};
use crate::models::RepoProfile;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

pub async fn register_repo(
    State(state): State<AppState>,
    Json(req): Json<RegisterRepoRequest>,
) -> Result<(StatusCode, Json<RepoResponse>)> {
    for (field, value) in [
        ("id", &req.id),
        ("source_root", &req.source_root),
        ("build_cmd", &req.build_cmd),
        ("test_cmd", &req.test_cmd),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::InvalidRequest(format!(
                "'{}' must not be empty",
                field
            )));
        }
    }

    let repo = RepoProfile {
        id: req.id,
        name: req.name,
        default_branch: req.default_branch.unwrap_or_else(|| "main".to_string()),
        package_manager: req.package_manager.unwrap_or_else(|| "npm".to_string()),
        source_root: req.source_root,
        build_cmd: req.build_cmd,
        test_cmd: req.test_cmd,
        bench_cmd: req.bench_cmd,
        created_at: chrono::Utc::now().timestamp_millis(),
    };

    state.store.repos.upsert(&repo).await?;
    Ok((StatusCode::CREATED, Json(RepoResponse::from(repo))))
}

pub async fn get_repo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RepoResponse>> {
    let repo = state.store.repos.get(&id).await?;
    Ok(Json(RepoResponse::from(repo)))
}

pub async fn list_repos(State(state): State<AppState>) -> Result<Json<ReposListResponse>> {
    let repos = state.store.repos.list().await?;
    let response = ReposListResponse {
        data: repos.into_iter().map(RepoResponse::from).collect(),
    };
    Ok(Json(response))
}
