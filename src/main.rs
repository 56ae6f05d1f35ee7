//! kelpie - chat backend with a tool-calling AI assistant
//!
//! A Rust backend exposing user accounts, chat threads, and an assistant
//! that can search the web, fetch URLs, and run snippets in a sandboxed
//! interpreter, streaming its progress over SSE.

mod agent;
mod api;
mod auth;
mod config;
mod db;
mod llm;
mod sandbox;
mod tools;

use agent::{Agent, MemoryStore};
use api::{create_router, AppState};
use config::Config;
use db::Database;
use llm::{LoggingModel, OpenAiClient};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tools::{SessionExecutors, ToolRegistry};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kelpie=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration: required values fail the boot, not a later request.
    let config = Config::from_env()?;

    // Ensure database directory exists
    if let Some(parent) = PathBuf::from(&config.db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path, "Opening database");
    let db = Database::open(&config.db_path)?;

    // Model endpoint client; a missing key only degrades later requests.
    let llm = Arc::new(OpenAiClient::new(
        config.llm_base_url.clone(),
        config.llm_api_key.clone(),
    )?);
    if config.llm_api_key.is_none() {
        tracing::warn!("LLM_API_KEY not set; model requests will be unauthenticated");
    }

    // Assemble the agent: both tool registries are fixed for the
    // lifetime of the process.
    let executors = SessionExecutors::new(config.sandbox_denylist.clone());
    let model = Arc::new(LoggingModel::new(llm.clone()));
    let agent = Arc::new(Agent::new(
        model,
        ToolRegistry::standard(config.num_search_results, executors),
        ToolRegistry::restricted(),
        MemoryStore::new(),
        Duration::from_secs(config.tool_timeout_secs),
    ));

    let state = AppState::new(
        db,
        agent,
        llm,
        config.secret_key.clone(),
        config.token_ttl_minutes,
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("kelpie server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
