//! Integration tests for interception through a live relay

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};

use rustap::{Config, Engine, Intercept, Payload};

fn relay_config(remote: SocketAddr) -> Config {
    let mut config = Config::default();
    config.listen.port = 0;
    config.remote.host = remote.ip().to_string();
    config.remote.port = remote.port();
    config
}

/// Server that records everything it receives and never replies
async fn spawn_sink_server() -> (SocketAddr, tokio::sync::mpsc::UnboundedReceiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                loop {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            let _ = tx.send(buf[..n].to_vec());
                        }
                    }
                }
            });
        }
    });

    (addr, rx)
}

/// Replaces every relayed chunk with a fixed marker
struct ReplaceWith(&'static [u8]);

#[async_trait]
impl Intercept for ReplaceWith {
    async fn transform(&self, data: Option<Bytes>) -> Option<Payload> {
        data.map(|_| Payload::Bytes(Bytes::from_static(self.0)))
    }
}

/// Drops every relayed chunk on the floor
struct DropAll;

#[async_trait]
impl Intercept for DropAll {
    async fn transform(&self, _data: Option<Bytes>) -> Option<Payload> {
        None
    }
}

#[tokio::test]
async fn custom_callback_rewrites_traffic_in_flight() {
    let (sink_addr, mut received) = spawn_sink_server().await;
    let engine = Engine::with_callback(
        Arc::new(relay_config(sink_addr)),
        Arc::new(ReplaceWith(b"PONG")),
    );
    let local_addr = engine.start().await.unwrap();

    let mut client = TcpStream::connect(local_addr).await.unwrap();
    client.write_all(b"PING").await.unwrap();

    let seen = timeout(Duration::from_secs(5), received.recv())
        .await
        .expect("sink saw no data")
        .unwrap();
    assert_eq!(seen, b"PONG");

    engine.stop().await;
}

#[tokio::test]
async fn dropping_callback_forwards_nothing() {
    let (sink_addr, mut received) = spawn_sink_server().await;
    let engine = Engine::with_callback(Arc::new(relay_config(sink_addr)), Arc::new(DropAll));
    let local_addr = engine.start().await.unwrap();

    let mut client = TcpStream::connect(local_addr).await.unwrap();
    client.write_all(b"should vanish").await.unwrap();

    let nothing = timeout(Duration::from_millis(500), received.recv()).await;
    assert!(nothing.is_err(), "dropped chunk reached the remote peer");

    engine.stop().await;
}
