use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::api::handlers::connection::AppState;
use crate::api::handlers::{chat, connection};
use crate::config::Config;
use crate::services::agent::{LlmAgent, QueryAgent};
use crate::services::registry::ConnectionRegistry;
use crate::storage::SqliteStorage;

/// Create router with application state
pub fn create_router_with_state(storage: Arc<SqliteStorage>, config: Config) -> Router {
    let registry = Arc::new(ConnectionRegistry::new());
    let agent: Arc<dyn QueryAgent> = Arc::new(LlmAgent::new(&config));

    let state = AppState {
        storage,
        config,
        registry,
        agent,
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/api/database/connect", post(connection::connect_database))
        .route("/api/database/connections", get(connection::list_connections))
        .route("/api/database/validate/{id}", post(connection::validate_connection))
        .route("/api/database/disconnect/{id}", post(connection::disconnect_database))
        .route("/api/chat/sessions", get(chat::list_sessions).post(chat::create_session))
        .route("/api/chat/sessions/{id}/messages", get(chat::get_messages))
        .route("/api/chat/sessions/{id}", axum::routing::delete(chat::delete_session))
        .route("/api/chat/query", post(chat::query_chat))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
