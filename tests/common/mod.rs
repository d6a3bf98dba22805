//! Shared fixtures: a scripted upstream client and service builders.

#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tutor_gateway::{
    ClientFactory, ClientHandle, Credential, CredentialRotator, DispatchBridge, DocumentContext,
    GatewayError, InMemoryContextStore, RotationStrategy, TutorService, UpstreamClient, UpstreamError,
};

pub const SESSION: &str = "session-1";

type Responder = Box<dyn Fn(&str) -> Result<String, UpstreamError> + Send + Sync>;

/// Upstream client whose replies are computed from the prompt.
pub struct ScriptedClient {
    responder: Responder,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&str) -> Result<String, UpstreamError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(text: &str) -> Arc<Self> {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub fn failing(err: UpstreamError) -> Arc<Self> {
        Self::new(move |_| Err(err.clone()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl UpstreamClient for ScriptedClient {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        (self.responder)(prompt)
    }
}

/// Hands out the same scripted client for every credential and counts
/// constructions.
pub struct SharedClientFactory {
    client: Arc<ScriptedClient>,
    pub constructions: AtomicUsize,
    pub delay: Duration,
}

impl SharedClientFactory {
    pub fn new(client: Arc<ScriptedClient>) -> Arc<Self> {
        Arc::new(Self {
            client,
            constructions: AtomicUsize::new(0),
            delay: Duration::ZERO,
        })
    }

    pub fn slow(client: Arc<ScriptedClient>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            client,
            constructions: AtomicUsize::new(0),
            delay,
        })
    }
}

impl ClientFactory for SharedClientFactory {
    fn create(&self, _credential: &Credential) -> Result<ClientHandle, GatewayError> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.constructions.fetch_add(1, Ordering::SeqCst);
        Ok(self.client.clone())
    }
}

pub fn service_with(client: Arc<ScriptedClient>, keys: &[&str], fallback: Option<&str>) -> TutorService {
    let rotator = Arc::new(CredentialRotator::new(
        keys.iter().copied(),
        RotationStrategy::RoundRobin,
        Duration::from_secs(60),
    ));
    TutorService::new(
        rotator,
        fallback.map(str::to_string),
        SharedClientFactory::new(client),
        DispatchBridge::new(4),
        Arc::new(InMemoryContextStore::new()),
    )
}

pub fn service(client: Arc<ScriptedClient>) -> TutorService {
    service_with(client, &["key-alpha", "key-beta"], None)
}

/// A document long enough for question generation.
pub fn document() -> DocumentContext {
    DocumentContext {
        filename: "ikigai.pdf".to_string(),
        content: "Ikigai is the Japanese concept of a reason for being. \
                  Okinawa is one of the Blue Zones, where people live unusually long lives. \
                  The book links purpose, community and daily movement to longevity."
            .to_string(),
    }
}

pub fn service_with_document(client: Arc<ScriptedClient>) -> TutorService {
    let service = service(client);
    service.store().put_document(SESSION, document());
    service
}
