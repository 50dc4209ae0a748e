use super::handlers::{health, repo, run};
use super::middleware::cors::add_cors;
use crate::orchestrator::Orchestrator;
use crate::repository::Store;
use axum::{
    Router,
    routing::{get, post},
};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub store: Store,
}

pub fn create_router(orchestrator: Orchestrator, store: Store) -> Router {
    let state = AppState {
        orchestrator,
        store,
    };

    let api_routes = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Repository registry
        .route("/api/repos", post(repo::register_repo))
        .route("/api/repos", get(repo::list_repos))
        .route("/api/repos/{id}", get(repo::get_repo))
        // Runs
        .route("/api/runs", post(run::start_run))
        .route("/api/runs", get(run::list_runs))
        .route("/api/runs/{id}", get(run::get_run))
        .route("/api/runs/{id}/cancel", post(run::cancel_run))
        .route("/api/runs/{id}/events", get(run::list_events))
        .route("/api/runs/{id}/opportunities", get(run::list_opportunities))
        .route("/api/runs/{id}/candidates", get(run::list_candidates))
        .route("/api/runs/{id}/validations", get(run::list_validations))
        .route("/api/runs/{id}/proposals", get(run::list_proposals))
        .route("/api/runs/{id}/artifacts", get(run::list_artifacts))
        // Artifact content by id
        .route("/api/artifacts/{id}", get(run::get_artifact))
        .with_state(state);

    add_cors(api_routes)
}
