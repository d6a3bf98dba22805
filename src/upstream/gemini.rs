//! # Gemini Client
//!
//! `generateContent` client for Google's generative language API.
//!
//! The async `reqwest` client is shared by every credential; a
//! [`GeminiClient`] only adds the key and the runtime handle it uses to
//! drive a request to completion from a blocking worker thread.

use crate::{
    config::Config,
    credentials::Credential,
    error::{GatewayError, UpstreamError},
    upstream::{ClientFactory, ClientHandle, HttpClientBuilder, UpstreamClient},
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Instant};
use tokio::runtime::Handle;
use tracing::debug;
use url::Url;

/// Longest error body carried into an `UpstreamError`.
const MAX_ERROR_BODY: usize = 512;

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    fn into_text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }
}

fn truncate_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    text.chars().take(MAX_ERROR_BODY).collect()
}

/// # Gemini Client
///
/// One per credential; cheap to clone the inner HTTP client.
pub struct GeminiClient {
    endpoint: String,
    model_id: String,
    credential: Credential,
    http: Client,
    runtime: Handle,
}

impl GeminiClient {
    /// Create a client. Fails when the derived endpoint is not a valid URL.
    pub fn new(
        base_url: &str,
        model_id: &str,
        credential: Credential,
        http: Client,
        runtime: Handle,
    ) -> Result<Self, GatewayError> {
        let endpoint = format!(
            "{}/models/{}:generateContent",
            base_url.trim_end_matches('/'),
            model_id
        );
        Url::parse(&endpoint)
            .map_err(|e| GatewayError::ClientConstruction(format!("invalid endpoint '{}': {}", endpoint, e)))?;

        Ok(Self {
            endpoint,
            model_id: model_id.to_string(),
            credential,
            http,
            runtime,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn generate_async(&self, prompt: &str) -> Result<String, UpstreamError> {
        let start_time = Instant::now();
        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", self.credential.secret())
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;

        debug!(
            model = %self.model_id,
            key_id = self.credential.id(),
            status = status.as_u16(),
            response_time_ms = start_time.elapsed().as_millis() as u64,
            "Gemini call completed"
        );

        if status.as_u16() == 429 {
            return Err(UpstreamError::Quota(truncate_body(&bytes)));
        }
        if !status.is_success() {
            let body = truncate_body(&bytes);
            if body.contains("RESOURCE_EXHAUSTED") {
                return Err(UpstreamError::Quota(body));
            }
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_slice(&bytes)
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;
        let text = parsed.into_text();
        if text.trim().is_empty() {
            return Err(UpstreamError::EmptyResponse);
        }
        Ok(text)
    }
}

impl UpstreamClient for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    /// Blocks the current thread. Must not be called from an async task;
    /// the dispatch bridge runs it on the blocking pool.
    fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        self.runtime.block_on(self.generate_async(prompt))
    }
}

/// # Gemini Client Factory
///
/// Produces [`GeminiClient`]s sharing one pooled HTTP client.
pub struct GeminiClientFactory {
    base_url: String,
    model_id: String,
    http: Client,
}

impl GeminiClientFactory {
    pub fn new(base_url: impl Into<String>, model_id: impl Into<String>, http: Client) -> Self {
        Self {
            base_url: base_url.into(),
            model_id: model_id.into(),
            http,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, GatewayError> {
        let http = HttpClientBuilder::from_config(config)
            .build()
            .map_err(|e| GatewayError::ClientConstruction(e.to_string()))?;
        Ok(Self::new(&config.upstream_base_url, &config.model_id, http))
    }
}

impl ClientFactory for GeminiClientFactory {
    fn create(&self, credential: &Credential) -> Result<ClientHandle, GatewayError> {
        let runtime = Handle::try_current()
            .map_err(|e| GatewayError::ClientConstruction(format!("no async runtime available: {}", e)))?;
        let client = GeminiClient::new(
            &self.base_url,
            &self.model_id,
            credential.clone(),
            self.http.clone(),
            runtime,
        )?;
        debug!(key_id = credential.id(), endpoint = client.endpoint(), "Constructed Gemini client");
        Ok(Arc::new(client))
    }
}
