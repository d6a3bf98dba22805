//! # Application State
//!
//! Shared state passed to every HTTP handler: the configuration and the
//! tutor service with its process-lifetime pools.

use crate::{
    config::Config,
    orchestrator::TutorService,
    store::{ContextStore, InMemoryContextStore},
    Result,
};
use std::sync::Arc;

/// # Application State
///
/// Cheap to clone; every clone points at the same service.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub service: Arc<TutorService>,
}

impl AppState {
    /// Production state: Gemini clients and an in-memory context store.
    pub fn new(config: Config) -> Result<Self> {
        let store: Arc<dyn ContextStore> = Arc::new(InMemoryContextStore::new());
        let service = TutorService::from_config(&config, store)?;
        Ok(Self::with_service(config, service))
    }

    /// State around an already assembled service.
    pub fn with_service(config: Config, service: TutorService) -> Self {
        Self {
            config: Arc::new(config),
            service: Arc::new(service),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn service(&self) -> &TutorService {
        &self.service
    }
}
