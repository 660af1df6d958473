//! Engine Lifecycle Controller
//!
//! Holds the run flag and the worker registry, and coordinates graceful
//! startup and shutdown of the accept loop and all relay workers.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::engine::acceptor::Acceptor;
use crate::intercept::Intercept;
use crate::Result;

pub struct Engine {
    config: Arc<Config>,
    callback: Arc<dyn Intercept>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
    session_slots: Arc<Semaphore>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl Engine {
    /// Create an engine with the callback named in the configuration
    pub fn new(config: Arc<Config>) -> Self {
        let callback = config.intercept.callback.resolve();
        Self::with_callback(config, callback)
    }

    /// Create an engine with a custom interception callback
    pub fn with_callback(config: Arc<Config>, callback: Arc<dyn Intercept>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let session_slots = Arc::new(Semaphore::new(config.relay.max_sessions));

        Self {
            config,
            callback,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            workers: Arc::new(Mutex::new(Vec::new())),
            session_slots,
            local_addr: Mutex::new(None),
        }
    }

    /// Bind the local endpoint and start accepting connections.
    ///
    /// The accept loop runs on its own task; control returns to the caller
    /// with the bound address. Bind failure is fatal: nothing is left
    /// running.
    pub async fn start(&self) -> Result<SocketAddr> {
        if self.running.swap(true, Ordering::SeqCst) {
            anyhow::bail!("Engine is already running");
        }

        let listener = match Acceptor::bind(&self.config).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("[Fatal] {:#}, quiting...", e);
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let local_addr = listener.local_addr()?;
        *self.local_addr.lock().unwrap() = Some(local_addr);

        info!(
            "Started proxying on {}, relaying to {}:{}",
            local_addr, self.config.remote.host, self.config.remote.port
        );
        if self.config.tls.enabled {
            warn!("TLS termination is not implemented, relaying plaintext");
        }

        let acceptor = Acceptor::new(
            listener,
            self.config.clone(),
            self.callback.clone(),
            self.running.clone(),
            self.shutdown_tx.clone(),
            self.workers.clone(),
            self.session_slots.clone(),
        );

        let handle = tokio::spawn(acceptor.run());
        self.workers.lock().unwrap().push(handle);

        Ok(local_addr)
    }

    /// Signal all workers to stop and wait until every one of them,
    /// including the accept loop, has terminated. Idempotent.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());

        loop {
            let handle = { self.workers.lock().unwrap().pop() };
            match handle {
                Some(handle) => {
                    if let Err(e) = handle.await {
                        if !e.is_cancelled() {
                            error!("Worker task failed: {}", e);
                        }
                    }
                }
                None => break,
            }
        }

        info!("Relay engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The bound listen address, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().unwrap()
    }

    /// Number of sessions currently relaying
    pub fn active_sessions(&self) -> usize {
        self.config.relay.max_sessions - self.session_slots.available_permits()
    }
}
