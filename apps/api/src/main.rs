mod config;
mod db;
mod errors;
mod history;
mod interview;
mod llm_client;
mod models;
mod routes;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, HistoryBackend};
use crate::db::create_pool;
use crate::history::recorder::HistoryRecorder;
use crate::history::store::{
    HistoryStore, MemoryHistoryStore, PgHistoryStore, RedisHistoryStore,
};
use crate::interview::engine::InterviewEngine;
use crate::interview::feedback::FeedbackRequester;
use crate::interview::questions::QuestionGenerator;
use crate::llm_client::{LlmClient, TextGenerator};
use crate::routes::build_router;
use crate::state::AppState;

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

    info!("Starting Coach API v{}", env!("CARGO_PKG_VERSION"));

    let store = build_history_store(&config.history_backend).await?;
    let recorder = HistoryRecorder::new(store);

    // Initialize LLM client
    let llm: Arc<dyn TextGenerator> = Arc::new(
        LlmClient::new(config.anthropic_api_key.clone()).context("building LLM client")?,
    );
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let settings = config.interview;
    info!(
        "Interview settings: {} questions, {}s per question, {}s total",
        settings.question_count,
        settings.question_time.as_secs(),
        settings.total_time.as_secs()
    );

    let engine = InterviewEngine::new(
        settings,
        QuestionGenerator::new(llm.clone()),
        FeedbackRequester::new(llm),
        recorder.clone(),
    );

    let state = AppState {
        engine,
        history: recorder,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Connects the configured history backend.
async fn build_history_store(backend: &HistoryBackend) -> Result<Arc<dyn HistoryStore>> {
    let store: Arc<dyn HistoryStore> = match backend {
        HistoryBackend::Postgres { database_url } => {
            let pool = create_pool(database_url).await?;
            Arc::new(PgHistoryStore::new(pool))
        }
        HistoryBackend::Redis { redis_url } => {
            let client = redis::Client::open(redis_url.as_str())
                .with_context(|| format!("invalid REDIS_URL '{redis_url}'"))?;
            info!("Redis client initialized");
            Arc::new(RedisHistoryStore::new(client))
        }
        HistoryBackend::Memory => {
            info!("Using in-memory interview history");
            Arc::new(MemoryHistoryStore::new())
        }
    };
    Ok(store)
}
