//! Interception Callback Contract

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::console::StdioConsole;
use super::interactive::Interactive;

/// What a callback hands back to the relay worker for forwarding.
///
/// Text is encoded as UTF-8 before it is written. An empty payload is a
/// zero-length write, which is not the same as dropping the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Bytes(Bytes),
    Text(String),
}

impl Payload {
    pub fn into_bytes(self) -> Bytes {
        match self {
            Payload::Bytes(bytes) => bytes,
            Payload::Text(text) => Bytes::from(text.into_bytes()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Payload::Bytes(bytes) => bytes.len(),
            Payload::Text(text) => text.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

/// The transformation applied to every chunk of relayed data.
///
/// Invoked once per read event, including when the read signaled no data
/// (`None` input). Returning `None` drops the event: nothing is written and
/// the worker moves on to the next read.
#[async_trait]
pub trait Intercept: Send + Sync {
    async fn transform(&self, data: Option<Bytes>) -> Option<Payload>;
}

/// Forwards data unchanged; absent input becomes empty text
pub struct Passthrough;

#[async_trait]
impl Intercept for Passthrough {
    async fn transform(&self, data: Option<Bytes>) -> Option<Payload> {
        match data {
            Some(data) => Some(Payload::Bytes(data)),
            None => Some(Payload::Text(String::new())),
        }
    }
}

/// The closed set of built-in callbacks, resolved once at configuration time.
///
/// Custom callbacks are injected through [`crate::Engine::with_callback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackKind {
    Passthrough,
    Interactive,
}

impl CallbackKind {
    pub fn resolve(self) -> Arc<dyn Intercept> {
        match self {
            CallbackKind::Passthrough => Arc::new(Passthrough),
            CallbackKind::Interactive => {
                Arc::new(Interactive::new(Arc::new(StdioConsole::new())))
            }
        }
    }
}

impl FromStr for CallbackKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "passthrough" | "default" => Ok(CallbackKind::Passthrough),
            "interactive" | "intercept" => Ok(CallbackKind::Interactive),
            other => Err(anyhow::anyhow!(
                "Unknown callback '{}', available: passthrough, interactive",
                other
            )),
        }
    }
}

impl std::fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallbackKind::Passthrough => write!(f, "passthrough"),
            CallbackKind::Interactive => write!(f, "interactive"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passthrough_is_identity_on_present_data() {
        let data = Bytes::from_static(b"some relayed chunk");
        let result = Passthrough.transform(Some(data.clone())).await;
        assert_eq!(result, Some(Payload::Bytes(data)));
    }

    #[tokio::test]
    async fn passthrough_yields_empty_text_on_absent_data() {
        let result = Passthrough.transform(None).await;
        assert_eq!(result, Some(Payload::Text(String::new())));
    }

    #[test]
    fn text_payload_encodes_to_utf8_bytes() {
        let payload = Payload::Text("ABCD".to_string());
        assert_eq!(payload.into_bytes(), Bytes::from_static(b"ABCD"));
    }

    #[test]
    fn callback_kind_parses_original_names() {
        assert_eq!(
            "default".parse::<CallbackKind>().unwrap(),
            CallbackKind::Passthrough
        );
        assert_eq!(
            "intercept".parse::<CallbackKind>().unwrap(),
            CallbackKind::Interactive
        );
        assert!("bogus".parse::<CallbackKind>().is_err());
    }
}
