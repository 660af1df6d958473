//! Relay Session

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::broadcast;
use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, info};

/// One forwarding direction of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From the accepted inbound connection towards the remote peer
    ClientToRemote,
    /// From the remote peer back to the inbound connection
    RemoteToClient,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::ClientToRemote => write!(f, "client->remote"),
            Direction::RemoteToClient => write!(f, "remote->client"),
        }
    }
}

/// An accepted inbound connection paired with its dialed outbound connection.
///
/// Created when the remote dial succeeds and destroyed once both relay
/// workers have exited; the first worker to leave marks the session closed,
/// which wakes its peer so both sockets get torn down together.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub client_addr: SocketAddr,
    pub remote_addr: SocketAddr,
    start_time: Instant,
    bytes_up: AtomicU64,
    bytes_down: AtomicU64,
    closed: AtomicBool,
    closed_tx: broadcast::Sender<()>,
    // admission slot, released when the session is dropped
    _slot: Option<OwnedSemaphorePermit>,
}

impl Session {
    pub fn new(
        id: String,
        client_addr: SocketAddr,
        remote_addr: SocketAddr,
        slot: Option<OwnedSemaphorePermit>,
    ) -> Self {
        debug!(
            "Creating new relay session: {} ({} <-> {})",
            id, client_addr, remote_addr
        );

        let (closed_tx, _) = broadcast::channel(1);
        Self {
            id,
            client_addr,
            remote_addr,
            start_time: Instant::now(),
            bytes_up: AtomicU64::new(0),
            bytes_down: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            closed_tx,
            _slot: slot,
        }
    }

    /// Receiver that fires when the session is marked closed
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.closed_tx.subscribe()
    }

    /// Mark the session closed and wake the peer worker; first caller wins
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.closed_tx.send(());
            self.log_stats();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn add_bytes(&self, direction: Direction, count: u64) {
        match direction {
            Direction::ClientToRemote => self.bytes_up.fetch_add(count, Ordering::Relaxed),
            Direction::RemoteToClient => self.bytes_down.fetch_add(count, Ordering::Relaxed),
        };
    }

    pub fn bytes_up(&self) -> u64 {
        self.bytes_up.load(Ordering::Relaxed)
    }

    pub fn bytes_down(&self) -> u64 {
        self.bytes_down.load(Ordering::Relaxed)
    }

    pub fn duration(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    fn log_stats(&self) {
        info!(
            "Session {} closed: {} <-> {} | Duration: {:?} | Up: {} bytes | Down: {} bytes",
            self.id,
            self.client_addr,
            self.remote_addr,
            self.duration(),
            self.bytes_up(),
            self.bytes_down()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_session() -> Session {
        Session::new(
            "test_session".to_string(),
            "127.0.0.1:12345".parse().unwrap(),
            "127.0.0.1:54321".parse().unwrap(),
            None,
        )
    }

    #[test]
    fn tracks_per_direction_byte_counts() {
        let session = test_session();
        assert_eq!(session.bytes_up(), 0);
        assert_eq!(session.bytes_down(), 0);

        session.add_bytes(Direction::ClientToRemote, 1024);
        session.add_bytes(Direction::ClientToRemote, 1024);
        session.add_bytes(Direction::RemoteToClient, 512);

        assert_eq!(session.bytes_up(), 2048);
        assert_eq!(session.bytes_down(), 512);
    }

    #[tokio::test]
    async fn close_wakes_subscribers_once() {
        let session = test_session();
        let mut rx = session.subscribe();

        assert!(!session.is_closed());
        session.close();
        session.close();

        assert!(session.is_closed());
        assert!(rx.recv().await.is_ok());
    }
}
