//! Configuration Types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::intercept::CallbackKind;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub listen: ListenConfig,
    pub remote: RemoteConfig,
    pub relay: RelayConfig,
    pub intercept: InterceptConfig,
    pub tls: TlsConfig,
}

/// Local listen endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
    pub transport: Transport,
    pub backlog: u32,
}

/// Remote dial endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteConfig {
    pub host: String,
    pub port: u16,
    #[serde(with = "humantime_serde")]
    pub dial_timeout: Duration,
}

/// Relay engine tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
    /// Maximum number of bytes requested per read
    pub window_size: usize,
    /// Maximum number of concurrently relayed sessions
    pub max_sessions: usize,
    /// How often the accept loop re-checks the run flag when idle
    #[serde(with = "humantime_serde")]
    pub accept_poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

/// Interception configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InterceptConfig {
    pub callback: CallbackKind,
}

/// TLS tunneling configuration.
///
/// The flag is accepted for forward compatibility; termination itself is not
/// implemented and the engine relays plaintext.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    pub enabled: bool,
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
}

/// Transport kind of the relayed endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Tcp,
    Udp,
}

impl FromStr for Transport {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" | "stream" => Ok(Transport::Tcp),
            "udp" | "datagram" => Ok(Transport::Udp),
            other => Err(anyhow::anyhow!(
                "Unknown transport '{}', only TCP and UDP are supported",
                other
            )),
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Tcp => write!(f, "tcp"),
            Transport::Udp => write!(f, "udp"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: ListenConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                transport: Transport::Tcp,
                backlog: 1,
            },
            remote: RemoteConfig {
                host: String::new(),
                port: 0,
                dial_timeout: Duration::from_secs(30),
            },
            relay: RelayConfig {
                window_size: 4096,
                max_sessions: 20,
                accept_poll_interval: Duration::from_millis(100),
                shutdown_timeout: Duration::from_secs(30),
            },
            intercept: InterceptConfig {
                callback: CallbackKind::Passthrough,
            },
            tls: TlsConfig {
                enabled: false,
                cert: None,
                key: None,
            },
        }
    }
}
