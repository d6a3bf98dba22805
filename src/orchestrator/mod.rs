//! # Request Orchestrators
//!
//! [`TutorService`] composes the rotator, client cache, dispatch bridge,
//! extractor and context store into the four tutoring operations:
//!
//! - [`TutorService::chat`]
//! - [`TutorService::generate_questions`]
//! - [`TutorService::evaluate_answer`]
//! - [`TutorService::evaluate_quiz`]
//!
//! Every operation is a single pass: load context, build a prompt, dispatch,
//! extract, persist. Store locks are only taken inside the synchronous store
//! calls, never across an upstream call. Nothing is retried; a quota error
//! parks the credential that produced it so the next request rotates past it.

mod chat;
mod evaluation;
mod questions;

pub use evaluation::{is_unanswered, score_mcq};

use crate::{
    client_cache::ClientCache,
    config::Config,
    credentials::{Credential, CredentialRotator},
    dispatch::DispatchBridge,
    error::GatewayError,
    extraction::OperationKind,
    schemas::{DocumentSelection, HistoryResponse, MessageResponse, RotationStatusResponse},
    store::{ContextStore, DocumentContext},
    upstream::{ClientFactory, GeminiClientFactory},
    Result,
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

const NO_DOCUMENT: &str = "No PDF selected. Please select a PDF first.";

/// # Tutor Service
///
/// Shared by every request handler. All members are process-lifetime
/// singletons injected at construction.
pub struct TutorService {
    rotator: Arc<CredentialRotator>,
    fallback_credential: Option<Credential>,
    clients: ClientCache,
    dispatch: DispatchBridge,
    store: Arc<dyn ContextStore>,
}

impl TutorService {
    pub fn new(
        rotator: Arc<CredentialRotator>,
        fallback_key: Option<String>,
        factory: Arc<dyn ClientFactory>,
        dispatch: DispatchBridge,
        store: Arc<dyn ContextStore>,
    ) -> Self {
        let fallback_credential = fallback_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .map(Credential::new);
        Self {
            rotator,
            fallback_credential,
            clients: ClientCache::new(factory),
            dispatch,
            store,
        }
    }

    /// Wire up the production stack: Gemini clients over the pooled HTTP
    /// client, sized and keyed from `config`.
    pub fn from_config(config: &Config, store: Arc<dyn ContextStore>) -> Result<Self> {
        let rotator = Arc::new(CredentialRotator::new(
            config.pooled_keys(),
            config.strategy(),
            Duration::from_secs(config.credential_cooldown_secs),
        ));
        let factory = Arc::new(GeminiClientFactory::from_config(config)?);

        info!(
            pool_size = rotator.pool_size(),
            strategy = rotator.strategy().as_str(),
            fallback_key = config.effective_fallback_key().is_some(),
            worker_pool_size = config.worker_pool_size,
            "Tutor service initialised"
        );

        Ok(Self::new(
            rotator,
            config.effective_fallback_key(),
            factory,
            DispatchBridge::new(config.worker_pool_size),
            store,
        ))
    }

    pub fn store(&self) -> &Arc<dyn ContextStore> {
        &self.store
    }

    pub fn rotator(&self) -> &Arc<CredentialRotator> {
        &self.rotator
    }

    pub fn dispatch(&self) -> &DispatchBridge {
        &self.dispatch
    }

    pub fn client_cache(&self) -> &ClientCache {
        &self.clients
    }

    /// Rotator first, then the static key.
    fn acquire_credential(&self) -> Result<Credential> {
        if let Some(credential) = self.rotator.next_credential() {
            return Ok(credential);
        }
        match &self.fallback_credential {
            Some(credential) => {
                debug!("Rotation pool unavailable, using static API key");
                Ok(credential.clone())
            }
            None => Err(GatewayError::CredentialExhausted),
        }
    }

    /// Run one upstream call for `kind` and return the raw reply text.
    async fn call_upstream(&self, kind: OperationKind, prompt: String) -> Result<String> {
        let credential = self.acquire_credential()?;
        let client = self.clients.get_or_create(&credential)?;
        let call_id = Uuid::new_v4().simple().to_string();
        let call_id = &call_id[..8];
        let start_time = Instant::now();

        let result = self.dispatch.invoke(client, prompt).await;
        let elapsed_ms = start_time.elapsed().as_millis() as u64;

        match &result {
            Ok(text) => debug!(
                call_id,
                operation = kind.as_str(),
                key_id = credential.id(),
                elapsed_ms,
                reply_len = text.len(),
                "Upstream call succeeded"
            ),
            Err(GatewayError::Upstream(err)) => {
                if err.is_quota() {
                    self.rotator.report_quota_exhausted(&credential);
                }
                warn!(
                    call_id,
                    operation = kind.as_str(),
                    key_id = credential.id(),
                    elapsed_ms,
                    error = %err,
                    "Upstream call failed"
                );
            }
            Err(err) => warn!(call_id, operation = kind.as_str(), error = %err, "Upstream call failed"),
        }
        result
    }

    fn document(&self, session: &str) -> Result<DocumentContext> {
        self.store
            .get_document(session)
            .ok_or_else(|| GatewayError::validation(NO_DOCUMENT))
    }

    pub fn select_document(&self, session: &str, selection: DocumentSelection) -> Result<DocumentContext> {
        if selection.filename.trim().is_empty() {
            return Err(GatewayError::validation("Document filename cannot be empty"));
        }
        let document = DocumentContext {
            filename: selection.filename,
            content: selection.content,
        };
        self.store.put_document(session, document.clone());
        info!(session, filename = %document.filename, characters = document.content.chars().count(), "Document selected");
        Ok(document)
    }

    pub fn get_history(&self, session: &str) -> HistoryResponse {
        HistoryResponse {
            history: self.store.get_history(session),
        }
    }

    pub fn clear_history(&self, session: &str) -> MessageResponse {
        self.store.clear_history(session);
        MessageResponse {
            message: "Chat history cleared".to_string(),
        }
    }

    /// Rotation pool and worker pool diagnostics. Never exposes secrets.
    pub fn rotation_status(&self) -> RotationStatusResponse {
        let stats = self.rotator.stats();
        let message = if stats.enabled {
            format!("API rotation active with {} keys", stats.total_keys)
        } else if self.fallback_credential.is_some() {
            "API rotation disabled, using the static API key".to_string()
        } else {
            "API rotation disabled and no API key configured".to_string()
        };
        RotationStatusResponse {
            enabled: stats.enabled,
            stats,
            dispatch: self.dispatch.stats(),
            cached_clients: self.clients.len(),
            message,
        }
    }
}
