mod agent;
mod chat;
mod config;
mod db;
mod directory;
mod errors;
mod llm_client;
mod models;
mod routes;
mod session;
mod source;
mod state;
mod streaming;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::agent::vocab::{CANDIDATE_VOCABULARY, JOB_VOCABULARY};
use crate::agent::{AgentDeps, SearchService};
use crate::chat::history::PgMessageLog;
use crate::config::Config;
use crate::db::{create_pool, ensure_schema};
use crate::directory::CategoryDirectory;
use crate::llm_client::{LlmClient, TextModel};
use crate::routes::build_router;
use crate::session::SessionRegistry;
use crate::source::{HttpRecordSource, RecordSource};
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

    info!("Starting assistant v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    ensure_schema(&db).await?;

    // Initialize LLM client
    let llm: Arc<dyn TextModel> = Arc::new(LlmClient::new(config.anthropic_api_key.clone())?);
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Remote record source shared by both agents
    let source: Arc<dyn RecordSource> = Arc::new(HttpRecordSource::new(
        config.categories_api_url.clone(),
        config.candidates_api_url.clone(),
        config.jobs_api_url.clone(),
        config.remote_timeout,
    )?);

    // One directory cache and one session registry per agent variant
    let candidates = SearchService::new(
        AgentDeps {
            llm: llm.clone(),
            source: source.clone(),
            directory: Arc::new(CategoryDirectory::new()),
            vocabulary: &CANDIDATE_VOCABULARY,
            timeouts: config.timeouts,
        },
        Arc::new(SessionRegistry::new()),
    );
    let jobs = SearchService::new(
        AgentDeps {
            llm,
            source,
            directory: Arc::new(CategoryDirectory::new()),
            vocabulary: &JOB_VOCABULARY,
            timeouts: config.timeouts,
        },
        Arc::new(SessionRegistry::new()),
    );

    spawn_idle_sweep(candidates.clone(), jobs.clone(), config.session_idle_ttl);

    // Build app state
    let state = AppState {
        config: config.clone(),
        message_log: Arc::new(PgMessageLog::new(db)),
        candidates,
        jobs,
    };

    // Build router
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()), // TODO: restrict origins once the web client domain is fixed
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically drops agents whose sessions have gone quiet.
fn spawn_idle_sweep(
    candidates: SearchService<models::record::Candidate>,
    jobs: SearchService<models::record::Job>,
    ttl: std::time::Duration,
) {
    let period = (ttl / 4).max(std::time::Duration::from_secs(30));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let evicted = candidates.evict_idle(ttl).await + jobs.evict_idle(ttl).await;
            if evicted > 0 {
                let remaining = candidates.active_sessions().await + jobs.active_sessions().await;
                info!("Evicted {evicted} idle agent(s); {remaining} active");
            } else {
                debug!("Idle sweep: nothing to evict");
            }
        }
    });
}
