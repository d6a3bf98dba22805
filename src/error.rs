//! # Error Types
//!
//! Error taxonomy for the gateway. Validation problems are reported straight
//! back to the caller, upstream failures are reported per operation, and
//! extraction problems never show up here at all: they are downgraded to
//! fallback payloads by the extractor.

#[cfg(feature = "server")]
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
#[cfg(feature = "server")]
use serde_json::json;
use thiserror::Error;

/// Failures raised by a single call to the upstream generative API.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("upstream did not respond in time")]
    Timeout,
    #[error("quota exhausted: {0}")]
    Quota(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("upstream returned no text")]
    EmptyResponse,
    #[error("could not decode upstream reply: {0}")]
    Decode(String),
    #[error("worker thread panicked: {0}")]
    WorkerPanicked(String),
}

impl UpstreamError {
    /// Whether the credential that produced this error should be parked.
    pub fn is_quota(&self) -> bool {
        matches!(self, UpstreamError::Quota(_))
    }
}

impl From<reqwest::Error> for UpstreamError {
    /// Classify reqwest failures by their underlying cause.
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout
        } else if err.is_connect() {
            UpstreamError::Transport("connection failed - unable to reach the AI provider".to_string())
        } else if let Some(status) = err.status() {
            if status.as_u16() == 429 {
                UpstreamError::Quota(err.to_string())
            } else {
                UpstreamError::Status {
                    status: status.as_u16(),
                    body: err.to_string(),
                }
            }
        } else if err.is_decode() {
            UpstreamError::Decode(err.to_string())
        } else {
            UpstreamError::Transport(err.to_string())
        }
    }
}

/// Top-level gateway error.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Bad input or missing session context. Never retried.
    #[error("{0}")]
    Validation(String),
    /// No pooled credential is available and no fallback key is configured.
    #[error("no API key available")]
    CredentialExhausted,
    /// The upstream call for this operation failed.
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),
    /// Building a client for a credential failed.
    #[error("failed to construct AI client: {0}")]
    ClientConstruction(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn validation(msg: impl Into<String>) -> Self {
        GatewayError::Validation(msg.into())
    }

    /// Stable machine-readable tag used in error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "validation_error",
            GatewayError::CredentialExhausted => "credential_exhaustion",
            GatewayError::Upstream(_) => "upstream_error",
            GatewayError::ClientConstruction(_) => "client_construction_error",
            GatewayError::Internal(_) => "internal_error",
        }
    }
}

impl From<tokio::task::JoinError> for GatewayError {
    fn from(err: tokio::task::JoinError) -> Self {
        GatewayError::Internal(format!("task join error: {}", err))
    }
}

#[cfg(feature = "server")]
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::CredentialExhausted => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::ClientConstruction(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "type": self.kind(),
                "code": status.as_u16()
            }
        }));

        (status, body).into_response()
    }
}
