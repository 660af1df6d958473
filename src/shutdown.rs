//! Graceful Shutdown Handling
//!
//! Listens for SIGTERM and SIGINT and drives a bounded shutdown of the relay
//! engine once a signal arrives.

use std::time::Duration;

use tokio::signal;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::engine::Engine;
use crate::Result;

/// Coordinates the signal-driven shutdown of the engine
pub struct ShutdownCoordinator {
    timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Wait for a shutdown signal (SIGTERM, SIGINT, ctrl-c)
    pub async fn listen_for_signals(&self) -> Result<()> {
        #[cfg(unix)]
        {
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
            let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, initiating graceful shutdown");
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, initiating graceful shutdown");
                }
                _ = signal::ctrl_c() => {
                    info!("Received Ctrl+C, initiating graceful shutdown");
                }
            }
        }

        #[cfg(windows)]
        {
            signal::ctrl_c().await?;
            info!("Received Ctrl+C, initiating graceful shutdown");
        }

        Ok(())
    }

    /// Stop the engine, bounded by the configured shutdown timeout.
    ///
    /// On expiry the remaining workers are abandoned; they exit on their own
    /// since the run flag is already cleared.
    pub async fn shutdown(&self, engine: &Engine) {
        match timeout(self.timeout, engine.stop()).await {
            Ok(()) => info!("All workers terminated"),
            Err(_) => warn!(
                "Shutdown timeout ({:?}) reached with workers still active",
                self.timeout
            ),
        }
    }
}
