//! HTTP API
//!
//! Conventional plumbing around the agent core: routing, bearer-token
//! authentication, thread/settings CRUD, and the SSE chat stream.

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::agent::Agent;
use crate::db::Database;
use crate::llm::OpenAiClient;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub agent: Arc<Agent>,
    /// Kept separately from the agent for the model-listing endpoint.
    pub llm: Arc<OpenAiClient>,
    pub secret_key: String,
    pub token_ttl_minutes: i64,
}

impl AppState {
    pub fn new(
        db: Database,
        agent: Arc<Agent>,
        llm: Arc<OpenAiClient>,
        secret_key: String,
        token_ttl_minutes: i64,
    ) -> Self {
        Self {
            db,
            agent,
            llm,
            secret_key,
            token_ttl_minutes,
        }
    }
}
