//! HTTP request handlers

use super::types::{
    ConversationResponse, CreateConversationResponse, ErrorResponse, SendMessageRequest,
    SendMessageResponse, SuccessResponse,
};
use super::AppState;
use crate::runtime::{EngineError, RuntimeError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/conversations/new", post(create_conversation))
        .route("/api/conversations/:id", get(get_conversation))
        .route("/api/conversations/:id/messages", post(send_message))
        .route("/api/conversations/:id/reset", post(reset_conversation))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Conversations
// ============================================================

async fn create_conversation(
    State(state): State<AppState>,
) -> Result<Json<CreateConversationResponse>, AppError> {
    let id = uuid::Uuid::new_v4().to_string();
    state.conversations.start(&id).await?;
    Ok(Json(CreateConversationResponse { id }))
}

async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationResponse>, AppError> {
    let conversation = state
        .conversations
        .state(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Conversation not found: {id}")))?;
    Ok(Json(ConversationResponse {
        id,
        state: conversation,
    }))
}

async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, AppError> {
    if req.text.trim().is_empty() {
        return Err(AppError::BadRequest("Message text is empty".to_string()));
    }
    if state.conversations.state(&id).await?.is_none() {
        return Err(AppError::NotFound(format!("Conversation not found: {id}")));
    }

    let delivered = state.conversations.send_message(&id, &req.text).await?;
    Ok(Json(SendMessageResponse {
        response: delivered.outcome.response,
        phase: delivered.outcome.state.phase,
        image_saved: delivered.image_path.is_some(),
        steps: delivered.outcome.trace,
    }))
}

async fn reset_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    // Resetting an unknown conversation already leaves it empty
    state.conversations.reset(&id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("sous-chef ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<RuntimeError> for AppError {
    fn from(err: RuntimeError) -> Self {
        if let RuntimeError::Engine(EngineError::StepBudgetExceeded { .. }) = &err {
            tracing::error!(error = %err, "Turn aborted");
        }
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
