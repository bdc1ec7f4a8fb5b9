mod config;
mod db;
mod errors;
mod extraction;
mod llm_client;
mod matching;
mod models;
mod ocr;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::matching::orchestrator::MatchingOrchestrator;
use crate::matching::scoring::LlmMatchScorer;
use crate::matching::store::PgMatchStore;
use crate::matching::trigger::{
    DisabledWorkflowTrigger, SpawnedWorkflowTrigger, WorkflowTrigger,
};
use crate::ocr::PdfTextExtractor;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("loanmatch_api={}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting loanmatch API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Matching pipeline: Postgres-backed store + LLM scorer behind the
    // orchestrator, dispatched by a spawned trigger (or disabled by config).
    let store = Arc::new(PgMatchStore::new(db.clone()));
    let scorer = Arc::new(LlmMatchScorer::new(llm.clone()));
    let orchestrator = Arc::new(MatchingOrchestrator::new(store, scorer));

    let workflows: Arc<dyn WorkflowTrigger> = if config.matching_enabled {
        Arc::new(SpawnedWorkflowTrigger::new(db.clone(), llm, orchestrator))
    } else {
        info!("MATCHING_ENABLED=false: post-upload pipelines are disabled");
        Arc::new(DisabledWorkflowTrigger)
    };

    // Build app state
    let state = AppState {
        db,
        extractor: Arc::new(PdfTextExtractor),
        workflows,
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
