mod cards;
mod collections;
mod config;
mod db;
mod errors;
mod imports;
mod llm_client;
mod models;
mod retry;
mod routes;
mod state;
mod store;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::collections::suggest::SuggestionTable;
use crate::config::Config;
use crate::db::create_pool;
use crate::imports::processor::resume_unfinished_jobs;
use crate::imports::tracker::ImportTracker;
use crate::llm_client::ProviderChain;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{PgStore, RecipeStore};

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

    info!("Starting Recipe Deck API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    let store: Arc<dyn RecipeStore> = Arc::new(PgStore::new(db));

    // Initialize AI providers (Gemini first, Claude as fallback)
    let llm = ProviderChain::from_keys(
        config.gemini_api_key.clone(),
        config.anthropic_api_key.clone(),
        config.ai_timeout,
    );
    if config.gemini_api_key.is_none() && config.anthropic_api_key.is_none() {
        warn!("No AI API keys configured; enhancement and text parsing will fail");
    }
    info!("AI providers: {}", llm.provider_names().join(" -> "));

    // Collection suggestion keywords
    let suggestions = SuggestionTable::load(config.suggestion_table_path.as_deref())
        .context("Failed to load collection suggestion table")?;
    info!(
        "Suggestion buckets: {}",
        suggestions.bucket_names().join(", ")
    );

    let tracker = ImportTracker::new(store.clone(), config.import_poll_interval);

    // Build app state
    let state = AppState {
        store,
        llm,
        config: config.clone(),
        tracker: tracker.clone(),
        suggestions: Arc::new(suggestions),
    };

    // Import tracker: resolve jobs left unfinished by a previous run, then poll
    let resumed = resume_unfinished_jobs(&state).await?;
    if resumed > 0 {
        info!("Resolved {resumed} unfinished import job(s)");
    }
    let tracker_task = tracker.start();

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracker.stop();
    if let Some(task) = tracker_task {
        task.await.context("Import tracker task panicked")?;
    }
    info!("Shut down cleanly");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
