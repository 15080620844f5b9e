use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::api::handlers::connection::AppState;
use crate::api::middleware::AppError;
use crate::models::{
    ChatMessage, ChatMessageView, ChatQueryRequest, ChatSession, ChatSessionCreated, ChatSessionView,
    DeleteSessionResponse, DeleteSessionStatus, SenderType,
};
use crate::services::cache::{threshold_fraction, SemanticCache};
use crate::services::orchestrator::QueryOrchestrator;
use crate::storage::SqliteStorage;

/// Create a new chat session
pub async fn create_session(State(state): State<AppState>) -> Result<Json<ChatSessionCreated>, AppError> {
    let session = ChatSession::new("Chat Session");
    state.storage.create_session(&session).await?;

    Ok(Json(ChatSessionCreated {
        session_id: session.id,
        created_at: session.created_at,
    }))
}

/// List all chat sessions, newest first
pub async fn list_sessions(State(state): State<AppState>) -> Result<Json<Vec<ChatSessionView>>, AppError> {
    let sessions = state.storage.list_sessions().await?;
    Ok(Json(
        sessions
            .into_iter()
            .map(|s| ChatSessionView {
                session_id: s.id,
                created_at: s.created_at,
                title: s.title,
            })
            .collect(),
    ))
}

/// List messages of one session, oldest first
pub async fn get_messages(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<ChatMessageView>>, AppError> {
    let messages = state.storage.list_messages(&session_id).await?;
    Ok(Json(
        messages
            .into_iter()
            .map(|m| ChatMessageView {
                message_id: m.id,
                sender_type: m.sender_type,
                content: m.content,
                timestamp: m.created_at,
            })
            .collect(),
    ))
}

/// Delete a session and its messages
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<DeleteSessionResponse>, AppError> {
    let deleted = state.storage.delete_session(&session_id).await?;
    Ok(Json(DeleteSessionResponse {
        session_id,
        status: if deleted {
            DeleteSessionStatus::Deleted
        } else {
            DeleteSessionStatus::NotFound
        },
    }))
}

/// Run a natural-language query and stream lifecycle events as NDJSON.
///
/// The connection is validated before the stream opens; a bad connection is
/// rejected with 400 rather than reported mid-stream.
pub async fn query_chat(
    State(state): State<AppState>,
    Json(payload): Json<ChatQueryRequest>,
) -> Result<Response, AppError> {
    let validation = state.registry.validate(&payload.connection_id).await;
    if !validation.is_valid {
        return Err(AppError::Validation(format!(
            "invalid connection: {}",
            validation.error.unwrap_or_else(|| "unknown".to_string())
        )));
    }

    let session = ensure_session(&state.storage, payload.session_id.as_deref()).await?;

    // Persist the user's question before streaming begins
    state
        .storage
        .add_message(&ChatMessage::new(&session.id, SenderType::User, payload.message.clone()))
        .await?;

    let orchestrator = QueryOrchestrator::new(
        state.registry.clone(),
        SemanticCache::new(state.storage.clone()),
        state.storage.clone(),
        state.agent.clone(),
        threshold_fraction(state.config.cache.similarity_threshold),
        state.config.cache.ttl_seconds,
        state.config.llm.temperature,
    );

    let (tx, rx) = mpsc::channel(32);
    let connection_id = payload.connection_id.clone();
    let message = payload.message.clone();
    let session_id = session.id.clone();
    tokio::spawn(async move {
        orchestrator.run(&connection_id, &message, &session_id, tx).await;
    });

    let stream = ReceiverStream::new(rx)
        .map(|event| Ok::<_, std::convert::Infallible>(Bytes::from(event.to_ndjson())));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// Reuse the requested session when it exists, otherwise create a fresh one
async fn ensure_session(
    storage: &SqliteStorage,
    session_id: Option<&str>,
) -> Result<ChatSession, AppError> {
    if let Some(id) = session_id {
        if let Some(session) = storage.get_session(id).await? {
            return Ok(session);
        }
    }
    let session = ChatSession::new("Chat Session");
    storage.create_session(&session).await?;
    Ok(session)
}
