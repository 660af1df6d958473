//! Relay Worker
//!
//! Owns one direction of one session: reads from the source, applies the
//! interception callback, writes the result to the destination, retrying
//! partial writes until the whole buffer is out or the engine stops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::broadcast;
use tracing::debug;

use crate::intercept::Intercept;
use crate::relay::io::{RecvOutcome, RelaySink, RelaySource, SendOutcome};
use crate::relay::session::{Direction, Session};

pub struct RelayWorker<S, D> {
    direction: Direction,
    src: S,
    dst: D,
    window_size: usize,
    callback: Arc<dyn Intercept>,
    running: Arc<AtomicBool>,
    engine_rx: broadcast::Receiver<()>,
    session: Arc<Session>,
    session_rx: broadcast::Receiver<()>,
}

impl<S: RelaySource, D: RelaySink> RelayWorker<S, D> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        direction: Direction,
        src: S,
        dst: D,
        window_size: usize,
        callback: Arc<dyn Intercept>,
        running: Arc<AtomicBool>,
        engine_rx: broadcast::Receiver<()>,
        session: Arc<Session>,
    ) -> Self {
        let session_rx = session.subscribe();
        Self {
            direction,
            src,
            dst,
            window_size,
            callback,
            running,
            engine_rx,
            session,
            session_rx,
        }
    }

    /// Run the forwarding loop until shutdown, session teardown, or a closed
    /// socket, then close this worker's half of the session.
    pub async fn run(mut self) {
        debug!(
            "Relay worker {} started for session {}",
            self.direction, self.session.id
        );

        'relay: while self.running.load(Ordering::Relaxed) && !self.session.is_closed() {
            let outcome = tokio::select! {
                _ = self.engine_rx.recv() => break 'relay,
                _ = self.session_rx.recv() => break 'relay,
                outcome = self.src.recv_ready(self.window_size, None) => outcome,
            };

            let chunk = match outcome {
                RecvOutcome::Data(data) => Some(data),
                RecvOutcome::Idle => None,
                RecvOutcome::Closed => {
                    debug!(
                        "Session {} {} source closed",
                        self.session.id, self.direction
                    );
                    break 'relay;
                }
            };

            // the callback also decides what an idle read means
            let Some(payload) = self.callback.transform(chunk).await else {
                continue;
            };
            let data: Bytes = payload.into_bytes();

            let mut sent = 0;
            while sent < data.len() {
                if !self.running.load(Ordering::Relaxed) || self.session.is_closed() {
                    self.session.add_bytes(self.direction, sent as u64);
                    break 'relay;
                }
                match self.dst.send_ready(&data[sent..], None).await {
                    SendOutcome::Sent(n) => sent += n,
                    // retry the same unsent suffix
                    SendOutcome::Idle => {}
                    SendOutcome::Closed => {
                        debug!(
                            "Session {} {} destination closed",
                            self.session.id, self.direction
                        );
                        self.session.add_bytes(self.direction, sent as u64);
                        break 'relay;
                    }
                }
            }
            self.session.add_bytes(self.direction, sent as u64);
        }

        self.dst.close().await;
        self.session.close();
        debug!(
            "Relay worker {} terminated for session {}",
            self.direction, self.session.id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intercept::{Passthrough, Payload};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    struct ScriptedSource {
        chunks: VecDeque<Bytes>,
    }

    impl ScriptedSource {
        fn new(chunks: &[&[u8]]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| Bytes::copy_from_slice(c)).collect(),
            }
        }
    }

    #[async_trait]
    impl RelaySource for ScriptedSource {
        async fn recv_ready(&mut self, _window_size: usize, _wait: Option<Duration>) -> RecvOutcome {
            match self.chunks.pop_front() {
                Some(chunk) => RecvOutcome::Data(chunk),
                None => RecvOutcome::Closed,
            }
        }
    }

    /// Sink that accepts at most `per_call` bytes per send attempt
    struct TrickleSink {
        written: Arc<Mutex<Vec<u8>>>,
        per_call: usize,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl RelaySink for TrickleSink {
        async fn send_ready(&mut self, data: &[u8], _wait: Option<Duration>) -> SendOutcome {
            let n = self.per_call.min(data.len());
            self.written.lock().unwrap().extend_from_slice(&data[..n]);
            SendOutcome::Sent(n)
        }

        async fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    struct DropEverything;

    #[async_trait]
    impl Intercept for DropEverything {
        async fn transform(&self, _data: Option<Bytes>) -> Option<Payload> {
            None
        }
    }

    struct Fixture {
        written: Arc<Mutex<Vec<u8>>>,
        sink_closed: Arc<AtomicBool>,
        session: Arc<Session>,
        running: Arc<AtomicBool>,
        _engine_tx: broadcast::Sender<()>,
    }

    fn fixture(
        chunks: &[&[u8]],
        per_call: usize,
        callback: Arc<dyn Intercept>,
    ) -> (RelayWorker<ScriptedSource, TrickleSink>, Fixture) {
        let written = Arc::new(Mutex::new(Vec::new()));
        let sink_closed = Arc::new(AtomicBool::new(false));
        let session = Arc::new(Session::new(
            "test_session".to_string(),
            "127.0.0.1:1111".parse().unwrap(),
            "127.0.0.1:2222".parse().unwrap(),
            None,
        ));
        let running = Arc::new(AtomicBool::new(true));
        let (engine_tx, engine_rx) = broadcast::channel(1);

        let worker = RelayWorker::new(
            Direction::ClientToRemote,
            ScriptedSource::new(chunks),
            TrickleSink {
                written: written.clone(),
                per_call,
                closed: sink_closed.clone(),
            },
            4096,
            callback,
            running.clone(),
            engine_rx,
            session.clone(),
        );

        (
            worker,
            Fixture {
                written,
                sink_closed,
                session,
                running,
                _engine_tx: engine_tx,
            },
        )
    }

    #[tokio::test]
    async fn trickle_destination_receives_full_buffer_in_order() {
        let (worker, fx) = fixture(
            &[b"The quick brown fox ", b"jumps over the lazy dog"],
            1,
            Arc::new(Passthrough),
        );

        worker.run().await;

        assert_eq!(
            fx.written.lock().unwrap().as_slice(),
            b"The quick brown fox jumps over the lazy dog".as_slice()
        );
        assert_eq!(fx.session.bytes_up(), 43);
        assert!(fx.sink_closed.load(Ordering::SeqCst));
        assert!(fx.session.is_closed());
    }

    #[tokio::test]
    async fn dropped_events_write_nothing() {
        let (worker, fx) = fixture(&[b"discard me"], 4096, Arc::new(DropEverything));

        worker.run().await;

        assert!(fx.written.lock().unwrap().is_empty());
        assert_eq!(fx.session.bytes_up(), 0);
    }

    #[tokio::test]
    async fn cleared_run_flag_stops_the_worker_before_reading() {
        let (worker, fx) = fixture(&[b"never forwarded"], 4096, Arc::new(Passthrough));
        fx.running.store(false, Ordering::SeqCst);

        worker.run().await;

        assert!(fx.written.lock().unwrap().is_empty());
        assert!(fx.session.is_closed());
    }

    #[tokio::test]
    async fn session_teardown_from_peer_stops_the_worker() {
        let (worker, fx) = fixture(&[b"pending"], 4096, Arc::new(Passthrough));
        // peer worker already tore the session down
        fx.session.close();

        worker.run().await;

        assert!(fx.sink_closed.load(Ordering::SeqCst));
    }
}
