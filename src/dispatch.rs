//! # Dispatch Bridge
//!
//! Runs blocking upstream calls on tokio's blocking pool, at most
//! `max_workers` at a time, and hands the result back as a future.
//!
//! Callers beyond the bound wait on a fair semaphore rather than being
//! rejected. The permit travels into the blocking closure, so it is released
//! only when the blocking call itself returns. A call that has started is
//! never aborted; dropping the returned future just discards its result.

use crate::{
    error::{GatewayError, UpstreamError},
    upstream::ClientHandle,
};
use serde::{Deserialize, Serialize};
use std::{
    any::Any,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::sync::Semaphore;
use tracing::{debug, error};

#[derive(Debug, Default)]
struct DispatchCounters {
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Tracks one executing call; decrements on drop, including during unwinding.
struct InFlightGuard<'a> {
    counters: &'a DispatchCounters,
}

impl<'a> InFlightGuard<'a> {
    fn enter(counters: &'a DispatchCounters) -> Self {
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        Self { counters }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// # Dispatch Bridge
///
/// Bounded worker pool for blocking upstream calls. Clone freely; clones
/// share the same bound and counters.
#[derive(Debug, Clone)]
pub struct DispatchBridge {
    semaphore: Arc<Semaphore>,
    max_workers: usize,
    counters: Arc<DispatchCounters>,
}

impl DispatchBridge {
    /// Create a bridge allowing `max_workers` concurrent calls (minimum 1).
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_workers)),
            max_workers,
            counters: Arc::new(DispatchCounters::default()),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run an arbitrary blocking job under the pool bound.
    pub async fn run<F, T>(&self, job: F) -> Result<T, GatewayError>
    where
        F: FnOnce() -> Result<T, UpstreamError> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| GatewayError::Internal("dispatch pool is closed".to_string()))?;

        let counters = self.counters.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let _guard = InFlightGuard::enter(&counters);
            job()
        });

        match handle.await {
            Ok(Ok(value)) => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                Ok(value)
            }
            Ok(Err(err)) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                debug!(error = %err, "Upstream call failed");
                Err(GatewayError::Upstream(err))
            }
            Err(join_err) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                if join_err.is_panic() {
                    let msg = panic_message(join_err.into_panic());
                    error!(panic = %msg, "Upstream worker panicked");
                    Err(GatewayError::Upstream(UpstreamError::WorkerPanicked(msg)))
                } else {
                    Err(GatewayError::from(join_err))
                }
            }
        }
    }

    /// Send `prompt` through `client` on the worker pool.
    pub async fn invoke(&self, client: ClientHandle, prompt: String) -> Result<String, GatewayError> {
        self.run(move || client.generate(&prompt)).await
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            max_workers: self.max_workers,
            in_flight: self.counters.in_flight.load(Ordering::SeqCst),
            peak_in_flight: self.counters.peak_in_flight.load(Ordering::SeqCst),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

/// Worker pool counters for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchStats {
    pub max_workers: usize,
    pub in_flight: usize,
    pub peak_in_flight: usize,
    pub completed: u64,
    pub failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_returns_job_value() {
        let bridge = DispatchBridge::new(2);
        let value = bridge.run(|| Ok::<_, UpstreamError>(21 * 2)).await.unwrap();
        assert_eq!(value, 42);
        assert_eq!(bridge.stats().completed, 1);
    }

    #[tokio::test]
    async fn test_job_error_is_reraised() {
        let bridge = DispatchBridge::new(2);
        let result = bridge
            .run(|| Err::<(), _>(UpstreamError::Quota("slow down".to_string())))
            .await;
        assert!(matches!(result, Err(GatewayError::Upstream(UpstreamError::Quota(_)))));
        assert_eq!(bridge.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_panic_is_captured() {
        let bridge = DispatchBridge::new(1);
        let result = bridge
            .run(|| -> Result<(), UpstreamError> { panic!("boom") })
            .await;
        match result {
            Err(GatewayError::Upstream(UpstreamError::WorkerPanicked(msg))) => assert_eq!(msg, "boom"),
            other => panic!("unexpected result: {:?}", other),
        }
        // The permit came back even though the worker unwound.
        let value = bridge.run(|| Ok::<_, UpstreamError>(1)).await.unwrap();
        assert_eq!(value, 1);
        assert_eq!(bridge.stats().in_flight, 0);
    }

    #[test]
    fn test_zero_workers_is_clamped() {
        assert_eq!(DispatchBridge::new(0).max_workers(), 1);
    }
}
