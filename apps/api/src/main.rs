mod analysis;
mod config;
mod db;
mod errors;
mod jobs;
mod models;
mod resumes;
mod routes;
mod state;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::orchestrator::Orchestrator;
use crate::analysis::queue::RedisQueue;
use crate::config::Config;
use crate::db::create_pool;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::jobs::PgJobStore;
use crate::store::resumes::PgResumeStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting HireLens API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let pool = create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied");

    // Initialize the Redis-backed analysis queue producer
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized");

    let jobs = Arc::new(PgJobStore::new(pool.clone()));
    let resumes = Arc::new(PgResumeStore::new(pool));
    let queue = Arc::new(RedisQueue::new(
        redis,
        config.analysis_queue_stream.clone(),
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        jobs.clone(),
        resumes.clone(),
        queue,
    ));

    // Build app state
    let state = AppState {
        jobs,
        resumes,
        orchestrator,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
