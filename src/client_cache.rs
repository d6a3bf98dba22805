//! # Client Cache
//!
//! One upstream client per distinct credential, built on first use and kept
//! for the life of the process.

use crate::{
    credentials::Credential,
    error::GatewayError,
    upstream::{ClientFactory, ClientHandle},
};
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tracing::{info, warn};

/// # Client Cache
///
/// Maps a credential's key id to its client handle. The vacant-entry path
/// holds the shard lock while the factory runs, so racing first requests for
/// the same credential produce exactly one construction. A failed
/// construction inserts nothing; the next caller tries again.
pub struct ClientCache {
    factory: Arc<dyn ClientFactory>,
    clients: DashMap<String, ClientHandle>,
    constructions: AtomicU64,
}

impl ClientCache {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            clients: DashMap::new(),
            constructions: AtomicU64::new(0),
        }
    }

    /// Return the cached client for `credential`, constructing it if needed.
    pub fn get_or_create(&self, credential: &Credential) -> Result<ClientHandle, GatewayError> {
        if let Some(client) = self.clients.get(credential.id()) {
            return Ok(client.value().clone());
        }

        match self.clients.entry(credential.id().to_string()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let client = self.factory.create(credential).map_err(|err| {
                    warn!(key_id = credential.id(), error = %err, "Client construction failed");
                    err
                })?;
                self.constructions.fetch_add(1, Ordering::Relaxed);
                info!(key_id = credential.id(), provider = client.name(), "Cached new upstream client");
                Ok(entry.insert(client).value().clone())
            }
        }
    }

    /// Number of cached clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Successful constructions since start-up
    pub fn constructions(&self) -> u64 {
        self.constructions.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::UpstreamError, upstream::UpstreamClient};
    use std::sync::atomic::AtomicUsize;

    struct EchoClient;

    impl UpstreamClient for EchoClient {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
            Ok(prompt.to_string())
        }
    }

    /// Fails the first `failures` constructions, then succeeds.
    struct FlakyFactory {
        calls: AtomicUsize,
        failures: usize,
    }

    impl ClientFactory for FlakyFactory {
        fn create(&self, _credential: &Credential) -> Result<ClientHandle, GatewayError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(GatewayError::ClientConstruction("provider init failed".to_string()))
            } else {
                Ok(Arc::new(EchoClient))
            }
        }
    }

    fn cache(failures: usize) -> (ClientCache, Arc<FlakyFactory>) {
        let factory = Arc::new(FlakyFactory {
            calls: AtomicUsize::new(0),
            failures,
        });
        (ClientCache::new(factory.clone()), factory)
    }

    #[test]
    fn test_reuses_client_for_same_credential() {
        let (cache, factory) = cache(0);
        let cred = Credential::new("k1");
        let a = cache.get_or_create(&cred).unwrap();
        let b = cache.get_or_create(&cred).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_distinct_credentials_get_distinct_clients() {
        let (cache, _) = cache(0);
        cache.get_or_create(&Credential::new("k1")).unwrap();
        cache.get_or_create(&Credential::new("k2")).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.constructions(), 2);
    }

    #[test]
    fn test_failed_construction_does_not_poison() {
        let (cache, factory) = cache(1);
        let cred = Credential::new("k1");
        assert!(matches!(
            cache.get_or_create(&cred),
            Err(GatewayError::ClientConstruction(_))
        ));
        assert!(cache.is_empty());

        let client = cache.get_or_create(&cred).unwrap();
        assert_eq!(client.generate("ping").unwrap(), "ping");
        assert_eq!(factory.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.constructions(), 1);
    }
}
