mod api;
mod config;
mod error;
mod generator;
mod models;
mod orchestrator;
mod repository;
mod sandbox;
mod scanner;
mod snapshot;
mod validator;

use crate::config::Config;
use crate::orchestrator::Orchestrator;
use crate::repository::{Store, establish_connection};
use crate::sandbox::LocalSandbox;
use crate::scanner::{PatternRegistry, Scanner};
use crate::snapshot::LocalCheckout;
use crate::validator::Validator;
use api::create_router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "optforge=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Starting optforge with config: {:?}", config);

    if let Some(path) = config.database_url.strip_prefix("sqlite:") {
        let path = std::path::Path::new(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Establish database connection
    let db_pool = establish_connection(&config.database_url).await?;
    tracing::info!("Database connected: {}", config.database_url);

    let store = Store::new(db_pool);

    // Wire the run engine
    let scanner = Scanner::new(Arc::new(PatternRegistry::default()));
    let validator = Validator::new(Arc::new(LocalSandbox), &config.engine);
    let orchestrator = Orchestrator::new(
        store.clone(),
        Arc::new(LocalCheckout),
        scanner,
        validator,
        config.engine.clone(),
    );

    // Create router
    let app = create_router(orchestrator, store);
    let app = app.layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let addr = addr.parse::<SocketAddr>()?;
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
