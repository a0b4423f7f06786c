//! Skirmish combat tracker API server entry point.

use std::error::Error;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use skirmish_api::config::AppConfig;
use skirmish_api::error::AppError;
use skirmish_api::routes;
use skirmish_api::state::AppState;
use skirmish_api::telemetry;
use skirmish_combat::domain::resources::HpStatusPolicy;
use skirmish_core::clock::{Clock, SystemClock};
use skirmish_core::rng::{DeterministicRng, StdRngSource};
use skirmish_store::pg_document_repository::PgDocumentRepository;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::from_env()?;
    let tracer_provider = telemetry::init(config.otel_endpoint.as_deref())?;

    tracing::info!("Starting Skirmish combat tracker API server");

    // Create database connection pool and bring the schema up to date.
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .map_err(AppError::from)?;
    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .map_err(AppError::from)?;

    // Build application state.
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(SystemClock);
    let rng: Arc<Mutex<dyn DeterministicRng + Send>> =
        Arc::new(Mutex::new(StdRngSource::from_os_rng()));
    let repository = Arc::new(PgDocumentRepository::new(pool));
    let hp_policy = HpStatusPolicy {
        critical_percent: config.hp_critical_percent,
    };
    let app_state = AppState::new(clock, rng, repository, hp_policy);

    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = routes::app_router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server.
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(AppError::from)?;

    axum::serve(listener, app).await.map_err(AppError::from)?;

    if let Some(provider) = tracer_provider {
        provider.shutdown()?;
    }

    Ok(())
}
