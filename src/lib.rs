//! # Tutor Gateway - Concurrent AI Invocation Gateway
//!
//! Services document-grounded tutoring requests (chat turns, quiz question
//! generation, answer and quiz grading) with an external generative API,
//! while keeping the upstream side fair and bounded:
//!
//! - **Credential rotation** across a pool of API keys, with quota cooldown
//!   and a static fallback key
//! - **One client per key**, built lazily and exactly once under concurrent
//!   first use
//! - **Bounded dispatch** of blocking upstream calls onto a worker pool,
//!   awaited from async handlers
//! - **Structured extraction** of JSON payloads from free-form replies, with
//!   deterministic fallbacks when the reply is unusable
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::net::SocketAddr;
//! use tutor_gateway::{create_router, AppState, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::for_test(); // or Config::parse_args() for CLI
//!     let state = AppState::new(config)?;
//!     let app = create_router(state);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`credentials`] - key pool, rotation strategies, usage stats
//! - [`client_cache`] - per-credential client cache
//! - [`upstream`] - provider client trait, Gemini client, HTTP client builder
//! - [`dispatch`] - bounded blocking-call bridge
//! - [`extraction`] and [`fallback`] - reply parsing and degraded defaults
//! - [`orchestrator`] - the tutoring operations
//! - [`store`] - session document and history store
//! - [`server`] - HTTP routes and handlers

pub mod client_cache;
pub mod config;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod extraction;
pub mod fallback;
pub mod graceful_shutdown;
pub mod orchestrator;
pub mod prompts;
pub mod schemas;
pub mod store;
pub mod upstream;

#[cfg(feature = "server")]
pub mod server;

// Re-export commonly used types for convenience
pub use client_cache::ClientCache;
pub use config::Config;
pub use credentials::{Credential, CredentialRotator, RotationStats, RotationStrategy};
pub use dispatch::{DispatchBridge, DispatchStats};
pub use error::{GatewayError, UpstreamError};
pub use extraction::{extract, ExtractShape, ExtractionResult, OperationKind};
pub use graceful_shutdown::GracefulShutdown;
pub use orchestrator::TutorService;
pub use store::{ContextStore, DocumentContext, HistoryEntry, InMemoryContextStore};
pub use upstream::{ClientFactory, ClientHandle, HttpClientBuilder, HttpClientConfig, UpstreamClient};

#[cfg(feature = "server")]
pub use server::{create_router, AppState};

/// The result type used throughout the library
pub type Result<T> = std::result::Result<T, GatewayError>;
