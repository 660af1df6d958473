//! Configuration Manager

use super::Config;
use crate::intercept::CallbackKind;
use crate::Result;
use anyhow::{bail, Context};
use std::path::Path;

use super::types::Transport;

/// Manages configuration loading and validation
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from file
    pub fn load_from_file(path: &Path) -> Result<Config> {
        if path.exists() {
            tracing::info!("Loading configuration from: {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

            config
                .validate()
                .with_context(|| "Configuration validation failed")?;

            tracing::info!("Configuration loaded and validated successfully");
            Ok(config)
        } else {
            tracing::warn!(
                "Configuration file not found at {}, using defaults",
                path.display()
            );
            Ok(Config::default())
        }
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Result<Config> {
        let mut config = Config::default();

        if let Ok(host) = std::env::var("RUSTAP_REMOTE_HOST") {
            config.remote.host = host;
        }

        if let Ok(port) = std::env::var("RUSTAP_REMOTE_PORT") {
            config.remote.port = port
                .parse::<u16>()
                .with_context(|| format!("Invalid RUSTAP_REMOTE_PORT: {}", port))?;
        }

        if let Ok(host) = std::env::var("RUSTAP_LISTEN_HOST") {
            config.listen.host = host;
        }

        if let Ok(port) = std::env::var("RUSTAP_LISTEN_PORT") {
            config.listen.port = port
                .parse::<u16>()
                .with_context(|| format!("Invalid RUSTAP_LISTEN_PORT: {}", port))?;
        }

        if let Ok(transport) = std::env::var("RUSTAP_TRANSPORT") {
            config.listen.transport = transport
                .parse::<Transport>()
                .with_context(|| format!("Invalid RUSTAP_TRANSPORT: {}", transport))?;
        }

        if let Ok(window) = std::env::var("RUSTAP_WINDOW_SIZE") {
            config.relay.window_size = window
                .parse::<usize>()
                .with_context(|| format!("Invalid RUSTAP_WINDOW_SIZE: {}", window))?;
        }

        if let Ok(sessions) = std::env::var("RUSTAP_MAX_SESSIONS") {
            config.relay.max_sessions = sessions
                .parse::<usize>()
                .with_context(|| format!("Invalid RUSTAP_MAX_SESSIONS: {}", sessions))?;
        }

        if let Ok(timeout) = std::env::var("RUSTAP_DIAL_TIMEOUT") {
            config.remote.dial_timeout = humantime::parse_duration(&timeout)
                .with_context(|| format!("Invalid RUSTAP_DIAL_TIMEOUT: {}", timeout))?;
        }

        if let Ok(callback) = std::env::var("RUSTAP_CALLBACK") {
            config.intercept.callback = callback
                .parse::<CallbackKind>()
                .with_context(|| format!("Invalid RUSTAP_CALLBACK: {}", callback))?;
        }

        Ok(config)
    }
}

impl Config {
    /// Apply CLI argument overrides (highest priority)
    #[allow(clippy::too_many_arguments)]
    pub fn merge_with_cli_args(
        &mut self,
        remote_host: Option<&str>,
        remote_port: Option<u16>,
        listen_host: Option<&str>,
        listen_port: Option<u16>,
        transport: Option<Transport>,
        window_size: Option<usize>,
        backlog: Option<u32>,
        max_sessions: Option<usize>,
        callback: Option<CallbackKind>,
        tls: bool,
    ) {
        if let Some(host) = remote_host {
            self.remote.host = host.to_string();
        }
        if let Some(port) = remote_port {
            self.remote.port = port;
        }
        if let Some(host) = listen_host {
            self.listen.host = host.to_string();
        }
        if let Some(port) = listen_port {
            self.listen.port = port;
        }
        if let Some(transport) = transport {
            self.listen.transport = transport;
        }
        if let Some(window) = window_size {
            self.relay.window_size = window;
        }
        if let Some(backlog) = backlog {
            self.listen.backlog = backlog;
        }
        if let Some(sessions) = max_sessions {
            self.relay.max_sessions = sessions;
        }
        if let Some(callback) = callback {
            self.intercept.callback = callback;
        }
        if tls {
            self.tls.enabled = true;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.remote.host.is_empty() {
            bail!("remote.host must be set");
        }

        if self.remote.port == 0 {
            bail!("remote.port must be set");
        }

        if self.listen.host.is_empty() {
            bail!("listen.host must be set");
        }

        if self.listen.backlog == 0 {
            bail!("listen.backlog must be greater than 0");
        }

        if self.relay.window_size == 0 {
            bail!("relay.window_size must be greater than 0");
        }

        if self.relay.window_size > 1048576 {
            bail!("relay.window_size cannot exceed 1MB");
        }

        if self.relay.max_sessions == 0 {
            bail!("relay.max_sessions must be greater than 0");
        }

        if self.relay.max_sessions > 100000 {
            bail!("relay.max_sessions cannot exceed 100,000 for safety");
        }

        if self.relay.accept_poll_interval.is_zero() {
            bail!("relay.accept_poll_interval must be greater than 0");
        }

        if self.tls.enabled && (self.tls.cert.is_none() || self.tls.key.is_none()) {
            bail!("tls.cert and tls.key must be set when tls.enabled is true");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.remote.host = "127.0.0.1".to_string();
        config.remote.port = 8080;
        config
    }

    #[test]
    fn default_config_fails_validation_without_remote() {
        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn zero_window_size_is_rejected() {
        let mut config = valid_config();
        config.relay.window_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn tls_requires_key_material() {
        let mut config = valid_config();
        config.tls.enabled = true;
        assert!(config.validate().is_err());

        config.tls.cert = Some("cert.pem".into());
        config.tls.key = Some("key.pem".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn cli_args_override_config() {
        let mut config = valid_config();
        config.merge_with_cli_args(
            Some("10.0.0.1"),
            Some(9002),
            None,
            Some(9001),
            None,
            Some(512),
            Some(4),
            Some(50),
            Some(CallbackKind::Interactive),
            false,
        );

        assert_eq!(config.remote.host, "10.0.0.1");
        assert_eq!(config.remote.port, 9002);
        assert_eq!(config.listen.port, 9001);
        assert_eq!(config.relay.window_size, 512);
        assert_eq!(config.listen.backlog, 4);
        assert_eq!(config.relay.max_sessions, 50);
        assert_eq!(config.intercept.callback, CallbackKind::Interactive);
    }
}
