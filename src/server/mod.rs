//! # Server Module
//!
//! Routes, handlers, shared state and the middleware stack for the HTTP
//! surface.

pub mod handlers;
pub mod state;

pub use handlers::{derive_session_id, SessionId, SESSION_HEADER};
pub use state::AppState;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::{self, TraceLayer},
};
use tracing::{warn, Level};

fn cors_layer(origin: &str) -> CorsLayer {
    if origin.trim() == "*" {
        return CorsLayer::permissive();
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(_) => {
            warn!(origin, "Invalid CORS origin, allowing any origin");
            CorsLayer::permissive()
        }
    }
}

/// Create router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config().cors_origin);

    Router::new()
        .route("/api/chat/", post(handlers::chat))
        .route(
            "/api/chat/history",
            get(handlers::get_history).delete(handlers::clear_history),
        )
        .route("/api/chat/generate-questions", post(handlers::generate_questions))
        .route("/api/chat/evaluate-answer", post(handlers::evaluate_answer))
        .route("/api/chat/evaluate-quiz", post(handlers::evaluate_quiz))
        .route("/api/chat/api-rotation-status", get(handlers::rotation_status))
        .route("/api/documents", post(handlers::select_document))
        .route("/health", get(handlers::health_check))
        .layer(
            ServiceBuilder::new()
                .layer(CompressionLayer::new())
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(cors),
        )
        .with_state(state)
}
