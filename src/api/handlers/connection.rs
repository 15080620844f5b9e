use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::config::Config;
use crate::models::{ConnectRequest, ConnectResponse, DisconnectResponse, ValidateResponse};
use crate::services::agent::QueryAgent;
use crate::services::registry::ConnectionRegistry;
use crate::storage::SqliteStorage;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<SqliteStorage>,
    pub config: Config,
    pub registry: Arc<ConnectionRegistry>,
    pub agent: Arc<dyn QueryAgent>,
}

/// Attach a new backend database.
///
/// Failures surface in the response body with `status: "failed"`, never as
/// an HTTP error.
pub async fn connect_database(
    State(state): State<AppState>,
    Json(payload): Json<ConnectRequest>,
) -> Json<ConnectResponse> {
    tracing::info!(
        "Connect requested for {} backend, database '{}'",
        payload.backend_kind,
        payload.database
    );
    Json(state.registry.connect(payload).await)
}

/// List live connections
pub async fn list_connections(State(state): State<AppState>) -> Json<serde_json::Value> {
    let connections = state.registry.list().await;
    Json(serde_json::json!({ "connections": connections }))
}

/// Re-probe a connection's liveness
pub async fn validate_connection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<ValidateResponse> {
    Json(state.registry.validate(&id).await)
}

/// Detach a backend database and release its handle
pub async fn disconnect_database(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<DisconnectResponse> {
    Json(state.registry.disconnect(&id).await)
}
