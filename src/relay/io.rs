//! Readiness I/O Primitive
//!
//! One bounded receive or send per call, gated on socket readiness with an
//! optional wait limit. No retries happen at this layer; retry policy lives
//! in the relay worker.

use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;
use tracing::debug;

/// Result of one readiness-gated receive.
///
/// Timeouts and transient errors both surface as `Idle` ("no data"); a
/// half-closed or broken socket surfaces as `Closed` so the worker can
/// terminate instead of retry-looping on a dead connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecvOutcome {
    Data(Bytes),
    Idle,
    Closed,
}

/// Result of one readiness-gated send attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent(usize),
    Idle,
    Closed,
}

/// The reading end a relay worker drains
#[async_trait]
pub trait RelaySource: Send {
    /// Wait up to `wait` (indefinitely when `None`) for readability, then
    /// perform one bounded read of up to `window_size` bytes.
    async fn recv_ready(&mut self, window_size: usize, wait: Option<Duration>) -> RecvOutcome;
}

/// The writing end a relay worker feeds
#[async_trait]
pub trait RelaySink: Send {
    /// Wait up to `wait` for writability, then attempt one send of `data`;
    /// reports how many bytes were accepted.
    async fn send_ready(&mut self, data: &[u8], wait: Option<Duration>) -> SendOutcome;

    /// Close the sink, swallowing errors
    async fn close(&mut self);
}

#[async_trait]
impl RelaySource for OwnedReadHalf {
    async fn recv_ready(&mut self, window_size: usize, wait: Option<Duration>) -> RecvOutcome {
        let ready = match wait {
            Some(limit) => match timeout(limit, self.readable()).await {
                Ok(ready) => ready,
                Err(_) => return RecvOutcome::Idle,
            },
            None => self.readable().await,
        };
        if ready.is_err() {
            return RecvOutcome::Closed;
        }

        let mut buf = vec![0u8; window_size];
        match self.try_read(&mut buf) {
            Ok(0) => RecvOutcome::Closed,
            Ok(n) => {
                buf.truncate(n);
                RecvOutcome::Data(Bytes::from(buf))
            }
            // readiness can be spurious; treat it like a timed-out wait
            Err(e) if e.kind() == ErrorKind::WouldBlock => RecvOutcome::Idle,
            Err(_) => RecvOutcome::Closed,
        }
    }
}

#[async_trait]
impl RelaySink for OwnedWriteHalf {
    async fn send_ready(&mut self, data: &[u8], wait: Option<Duration>) -> SendOutcome {
        let ready = match wait {
            Some(limit) => match timeout(limit, self.writable()).await {
                Ok(ready) => ready,
                Err(_) => return SendOutcome::Idle,
            },
            None => self.writable().await,
        };
        if ready.is_err() {
            return SendOutcome::Closed;
        }

        match self.try_write(data) {
            Ok(n) => SendOutcome::Sent(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => SendOutcome::Idle,
            Err(_) => SendOutcome::Closed,
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.shutdown().await {
            debug!("Failed to close outbound write half: {}", e);
        }
    }
}
