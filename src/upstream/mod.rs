//! # Upstream AI Provider
//!
//! The seam between the gateway and the generative API. Calls are blocking
//! by contract; the dispatch bridge is responsible for keeping them off the
//! request-handling tasks.

use crate::{credentials::Credential, error::{GatewayError, UpstreamError}};
use std::sync::Arc;

pub mod gemini;
pub mod http_client;

pub use gemini::{GeminiClient, GeminiClientFactory};
pub use http_client::{HttpClientBuilder, HttpClientConfig, HttpClientError};

/// A client bound to one credential. Implementations must tolerate many
/// concurrent `generate` calls.
pub trait UpstreamClient: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Send one prompt and block until the full reply text is available.
    fn generate(&self, prompt: &str) -> Result<String, UpstreamError>;
}

/// Shared handle to a cached client.
pub type ClientHandle = Arc<dyn UpstreamClient>;

/// Builds clients for the client cache. Construction may be expensive and
/// may fail.
pub trait ClientFactory: Send + Sync {
    fn create(&self, credential: &Credential) -> Result<ClientHandle, GatewayError>;
}
