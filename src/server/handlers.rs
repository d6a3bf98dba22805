//! # Server Handlers
//!
//! Thin HTTP wrappers over [`TutorService`](crate::orchestrator::TutorService).
//! Every handler resolves the caller's session first.

use super::AppState;
use crate::{
    credentials::short_digest,
    error::GatewayError,
    schemas::{
        AnswerEvaluationRequest, AnswerEvaluationResponse, ChatMessage, ChatResponse,
        DocumentSelectedResponse, DocumentSelection, HealthResponse, HistoryResponse,
        MessageResponse, QuestionGenerationRequest, QuestionGenerationResponse,
        QuizSubmissionRequest, QuizSubmissionResponse, RotationStatusResponse,
    },
};
use axum::{
    extract::{ConnectInfo, FromRequestParts, State},
    http::request::Parts,
    Json,
};
use std::{convert::Infallible, net::SocketAddr};

/// Header a client may use to name its session explicitly.
pub const SESSION_HEADER: &str = "x-session-id";

/// `user_` plus 12 hex chars of the SHA-256 of the peer address.
pub fn derive_session_id(peer: Option<&str>) -> String {
    format!("user_{}", short_digest(peer.unwrap_or("unknown")))
}

/// # Session Id
///
/// Taken from `X-Session-Id` when present, otherwise derived from the peer
/// address. Never rejects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

impl<S> FromRequestParts<S> for SessionId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let explicit = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(session) = explicit {
            return Ok(SessionId(session.to_string()));
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        Ok(SessionId(derive_session_id(peer.as_deref())))
    }
}

pub async fn chat(
    State(state): State<AppState>,
    SessionId(session): SessionId,
    Json(message): Json<ChatMessage>,
) -> Result<Json<ChatResponse>, GatewayError> {
    let response = state.service().chat(&session, &message).await?;
    Ok(Json(response))
}

pub async fn get_history(
    State(state): State<AppState>,
    SessionId(session): SessionId,
) -> Json<HistoryResponse> {
    Json(state.service().get_history(&session))
}

pub async fn clear_history(
    State(state): State<AppState>,
    SessionId(session): SessionId,
) -> Json<MessageResponse> {
    Json(state.service().clear_history(&session))
}

pub async fn generate_questions(
    State(state): State<AppState>,
    SessionId(session): SessionId,
    Json(request): Json<QuestionGenerationRequest>,
) -> Result<Json<QuestionGenerationResponse>, GatewayError> {
    let response = state.service().generate_questions(&session, &request).await?;
    Ok(Json(response))
}

pub async fn evaluate_answer(
    State(state): State<AppState>,
    SessionId(session): SessionId,
    Json(request): Json<AnswerEvaluationRequest>,
) -> Result<Json<AnswerEvaluationResponse>, GatewayError> {
    let response = state.service().evaluate_answer(&session, &request).await?;
    Ok(Json(response))
}

pub async fn evaluate_quiz(
    State(state): State<AppState>,
    SessionId(session): SessionId,
    Json(request): Json<QuizSubmissionRequest>,
) -> Result<Json<QuizSubmissionResponse>, GatewayError> {
    let response = state.service().evaluate_quiz(&session, &request).await?;
    Ok(Json(response))
}

pub async fn rotation_status(State(state): State<AppState>) -> Json<RotationStatusResponse> {
    Json(state.service().rotation_status())
}

/// Stands in for the upload service: records the session's document.
pub async fn select_document(
    State(state): State<AppState>,
    SessionId(session): SessionId,
    Json(selection): Json<DocumentSelection>,
) -> Result<Json<DocumentSelectedResponse>, GatewayError> {
    let document = state.service().select_document(&session, selection)?;
    Ok(Json(DocumentSelectedResponse {
        message: "Document selected".to_string(),
        characters: document.content.chars().count(),
        filename: document.filename,
    }))
}

/// Health check handler
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
