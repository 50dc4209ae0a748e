use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Repository not found: {0}")]
    RepoNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("A non-terminal run already exists for repository {0}")]
    RunConflict(String),

    #[error("Snapshot unavailable: {0}")]
    SnapshotUnavailable(String),

    #[error("Sandbox unavailable: {0}")]
    SandboxUnavailable(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            AppError::RepoNotFound(id) => (
                StatusCode::NOT_FOUND,
                format!("Repository '{}' not found", id),
            ),
            AppError::RunNotFound(id) => (StatusCode::NOT_FOUND, format!("Run '{}' not found", id)),
            AppError::ArtifactNotFound(id) => (
                StatusCode::NOT_FOUND,
                format!("Artifact '{}' not found", id),
            ),
            AppError::RunConflict(repo_id) => (
                StatusCode::CONFLICT,
                format!(
                    "A non-terminal run already exists for repository '{}'",
                    repo_id
                ),
            ),
            AppError::SnapshotUnavailable(reason) => (StatusCode::BAD_GATEWAY, reason),
            AppError::SandboxUnavailable(reason) => {
                tracing::error!("Sandbox unavailable: {}", reason);
                (StatusCode::SERVICE_UNAVAILABLE, reason)
            }
            AppError::InvalidRequest(reason) => (StatusCode::BAD_REQUEST, reason),
            AppError::Io(e) => {
                tracing::error!("IO error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };

        let body = json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
