//! Connection Acceptor
//!
//! Binds the local endpoint, accepts inbound connections, dials the paired
//! remote connection, and spawns the two relay workers of each session.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};
use tokio::net::{lookup_host, TcpListener, TcpSocket, TcpStream};
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::{Config, Transport};
use crate::intercept::Intercept;
use crate::relay::{Direction, RelayWorker, Session};
use crate::Result;

pub struct Acceptor {
    listener: TcpListener,
    config: Arc<Config>,
    callback: Arc<dyn Intercept>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
    session_slots: Arc<Semaphore>,
}

impl Acceptor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        listener: TcpListener,
        config: Arc<Config>,
        callback: Arc<dyn Intercept>,
        running: Arc<AtomicBool>,
        shutdown_tx: broadcast::Sender<()>,
        workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
        session_slots: Arc<Semaphore>,
    ) -> Self {
        Self {
            listener,
            config,
            callback,
            running,
            shutdown_tx,
            workers,
            session_slots,
        }
    }

    /// Create the listening endpoint at the configured local host/port with
    /// the configured backlog. Failure here is fatal to engine startup.
    pub async fn bind(config: &Config) -> Result<TcpListener> {
        if config.listen.transport == Transport::Udp {
            return Err(anyhow!(
                "Datagram relaying is not supported, only the stream transport is implemented"
            ));
        }

        let addr = resolve_endpoint(&config.listen.host, config.listen.port)
            .await
            .context("Failed to resolve listen endpoint")?;

        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .context("Failed to create listening socket")?;

        socket
            .set_reuseaddr(true)
            .context("Failed to set SO_REUSEADDR")?;
        socket
            .bind(addr)
            .with_context(|| format!("Failed to bind {}", addr))?;

        socket
            .listen(config.listen.backlog)
            .with_context(|| format!("Failed to listen on {}", addr))
    }

    /// Accept inbound connections until the engine stops
    pub async fn run(self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        info!("Accepting inbound connections");

        while self.running.load(Ordering::Relaxed) {
            // short accept poll so the run flag is re-checked even when idle
            let accepted = tokio::select! {
                _ = shutdown_rx.recv() => break,
                accepted = timeout(self.config.relay.accept_poll_interval, self.listener.accept()) => accepted,
            };

            let (inbound, peer_addr) = match accepted {
                Err(_) => continue,
                Ok(Ok(pair)) => pair,
                Ok(Err(e)) => {
                    error!("Error accepting connection: {}", e);
                    continue;
                }
            };

            info!("Got new inbound connection from {}", peer_addr);

            let slot = match self.session_slots.clone().try_acquire_owned() {
                Ok(slot) => slot,
                Err(_) => {
                    warn!(
                        "Session limit ({}) reached, rejecting connection from {}",
                        self.config.relay.max_sessions, peer_addr
                    );
                    continue;
                }
            };

            match self.dial_remote().await {
                Ok(outbound) => {
                    self.spawn_session(inbound, peer_addr, outbound, slot);
                }
                Err(e) => {
                    // session-fatal only: the inbound connection is dropped
                    // and the accept loop carries on
                    error!(
                        "Failed to attach to remote host {}:{}: {:#}",
                        self.config.remote.host, self.config.remote.port, e
                    );
                }
            }
        }

        info!("Accept loop terminated");
    }

    /// Open the paired outbound connection for a newly accepted session
    async fn dial_remote(&self) -> Result<TcpStream> {
        let remote = &self.config.remote;
        let addrs: Vec<SocketAddr> = lookup_host((remote.host.as_str(), remote.port))
            .await
            .with_context(|| format!("Failed to resolve {}:{}", remote.host, remote.port))?
            .collect();

        if addrs.is_empty() {
            return Err(anyhow!(
                "DNS resolution returned no addresses for {}",
                remote.host
            ));
        }

        let mut last_error = None;
        for addr in addrs {
            match timeout(remote.dial_timeout, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => {
                    debug!("Connected to remote peer at {}", addr);
                    return Ok(stream);
                }
                Ok(Err(e)) => {
                    warn!("Failed to connect to {}: {}", addr, e);
                    last_error = Some(anyhow!("Connection failed: {}", e));
                }
                Err(_) => {
                    warn!("Connection to {} timed out", addr);
                    last_error = Some(anyhow!("Connection timed out"));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("No addresses resolved")))
    }

    /// Spawn and register the two relay workers of a new session
    fn spawn_session(
        &self,
        inbound: TcpStream,
        peer_addr: SocketAddr,
        outbound: TcpStream,
        slot: tokio::sync::OwnedSemaphorePermit,
    ) {
        let remote_addr = match outbound.peer_addr() {
            Ok(addr) => addr,
            Err(e) => {
                error!("Failed to get remote peer address: {}", e);
                return;
            }
        };

        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis();
        let session_id = format!("session_{}_{}", timestamp, peer_addr.port());

        let session = Arc::new(Session::new(
            session_id.clone(),
            peer_addr,
            remote_addr,
            Some(slot),
        ));

        let (inbound_read, inbound_write) = inbound.into_split();
        let (outbound_read, outbound_write) = outbound.into_split();

        let upstream = RelayWorker::new(
            Direction::ClientToRemote,
            inbound_read,
            outbound_write,
            self.config.relay.window_size,
            self.callback.clone(),
            self.running.clone(),
            self.shutdown_tx.subscribe(),
            session.clone(),
        );
        let downstream = RelayWorker::new(
            Direction::RemoteToClient,
            outbound_read,
            inbound_write,
            self.config.relay.window_size,
            self.callback.clone(),
            self.running.clone(),
            self.shutdown_tx.subscribe(),
            session.clone(),
        );

        // no new workers once shutdown has begun; dropping the halves here
        // closes both connections
        if !self.running.load(Ordering::Relaxed) {
            debug!("Discarding session {} due to shutdown", session_id);
            return;
        }

        self.register(tokio::spawn(upstream.run()));
        self.register(tokio::spawn(downstream.run()));

        info!(
            "Session {} established: {} <-> {}",
            session_id, peer_addr, remote_addr
        );
    }

    fn register(&self, handle: JoinHandle<()>) {
        let mut workers = self.workers.lock().unwrap();
        // reap finished sessions so the registry stays bounded
        workers.retain(|handle| !handle.is_finished());
        workers.push(handle);
    }
}

/// Resolve a host/port pair to its first socket address
pub async fn resolve_endpoint(host: &str, port: u16) -> Result<SocketAddr> {
    lookup_host((host, port))
        .await
        .with_context(|| format!("Failed to resolve {}:{}", host, port))?
        .next()
        .ok_or_else(|| anyhow!("DNS resolution returned no addresses for {}", host))
}
