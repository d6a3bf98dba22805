//! # Graceful Shutdown Module
//!
//! Turns Ctrl-C / SIGTERM into a shutdown future for `axum::serve`. In-flight
//! requests are allowed to finish, which includes any upstream calls already
//! running on the dispatch pool.

use std::sync::Arc;
use tokio::{signal, sync::watch};
use tracing::{error, info};

/// # Graceful Shutdown Manager
///
/// Clones share one shutdown flag.
#[derive(Clone)]
pub struct GracefulShutdown {
    initiated: Arc<watch::Sender<bool>>,
}

impl GracefulShutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { initiated: Arc::new(tx) }
    }

    pub fn is_shutdown_initiated(&self) -> bool {
        *self.initiated.borrow()
    }

    pub fn initiate_shutdown(&self) {
        if !self.initiated.send_replace(true) {
            info!("🛑 Graceful shutdown initiated");
        }
    }

    /// Resolves once shutdown has been initiated.
    pub async fn initiated(&self) {
        let mut rx = self.initiated.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|initiated| *initiated).await;
    }

    /// Wait for Ctrl-C or SIGTERM, then initiate shutdown.
    pub async fn wait_for_shutdown_signal(&self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
            tokio::select! {
                result = signal::ctrl_c() => {
                    result?;
                    info!("📡 Received SIGINT (Ctrl+C)");
                }
                _ = sigterm.recv() => info!("📡 Received SIGTERM"),
                _ = self.initiated() => return Ok(()),
            }
        }
        #[cfg(not(unix))]
        {
            tokio::select! {
                result = signal::ctrl_c() => {
                    result?;
                    info!("📡 Received Ctrl+C");
                }
                _ = self.initiated() => return Ok(()),
            }
        }

        self.initiate_shutdown();
        Ok(())
    }

    /// Future for `axum::serve(..).with_graceful_shutdown(..)`.
    pub async fn signal(self) {
        if let Err(err) = self.wait_for_shutdown_signal().await {
            error!(error = %err, "Could not install signal handlers; shutting down");
            self.initiate_shutdown();
        }
    }
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::new()
    }
}
