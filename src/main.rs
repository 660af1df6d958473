//! rustap - Intercepting Network Relay
//!
//! Accepts connections on a local endpoint, opens a matching connection to a
//! remote endpoint, and forwards bytes in both directions while a pluggable
//! callback inspects and optionally rewrites every chunk in flight.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rustap::config::{ConfigManager, Transport};
use rustap::{CallbackKind, Engine, ShutdownCoordinator};

/// CLI arguments for rustap
#[derive(Parser, Debug)]
#[command(name = "rustap")]
#[command(about = "Intercepting network relay")]
#[command(version)]
#[command(long_about = "
rustap - Intercepting network relay

Accepts connections on a local endpoint, attaches each one to the configured
remote endpoint, and forwards bytes in both directions through an
interception callback. Useful for protocol inspection, fuzzing, and manual
traffic tampering.

Configuration priority (highest to lowest):
1. Command-line arguments
2. Configuration file
3. Environment variables
4. Built-in defaults

Environment variables:
  RUSTAP_REMOTE_HOST   - Remote address to connect to
  RUSTAP_REMOTE_PORT   - Remote port to connect to
  RUSTAP_LISTEN_HOST   - Local address to bind
  RUSTAP_LISTEN_PORT   - Local port to bind
  RUSTAP_TRANSPORT     - Transport to relay (tcp or udp)
  RUSTAP_WINDOW_SIZE   - Bytes to read per receive
  RUSTAP_MAX_SESSIONS  - Maximum concurrent sessions
  RUSTAP_DIAL_TIMEOUT  - Remote dial timeout (e.g. 30s)
  RUSTAP_CALLBACK      - Interception callback to use
")]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml", help = "Path to configuration file")]
    pub config: PathBuf,

    /// Remote address to connect to
    #[arg(long, help = "Remote address to connect to")]
    pub rhost: Option<String>,

    /// Remote port to connect to
    #[arg(long, help = "Remote port to connect to")]
    pub rport: Option<u16>,

    /// Local address to bind
    #[arg(long, help = "Local address to bind, defaults to 127.0.0.1")]
    pub lhost: Option<String>,

    /// Local port to bind
    #[arg(long, help = "Local port to bind")]
    pub lport: Option<u16>,

    /// Transport to relay
    #[arg(long, help = "Protocol to use, UDP or TCP, defaults to TCP")]
    pub proto: Option<String>,

    /// Bytes to read per receive
    #[arg(long, help = "How many bytes to read at once, defaults to 4096")]
    pub window_size: Option<usize>,

    /// Listen backlog depth
    #[arg(long, help = "How many connections to allow on the backlog, defaults to 1")]
    pub backlog: Option<u32>,

    /// Maximum concurrent sessions
    #[arg(long, help = "How many concurrent sessions to relay, defaults to 20")]
    pub max_sessions: Option<usize>,

    /// Interception callback to use
    #[arg(long, help = "Callback function to use, see --list-callbacks")]
    pub callback: Option<String>,

    /// Show callback usage and quit
    #[arg(long, help = "Show available callback functions and quit")]
    pub list_callbacks: bool,

    /// Enable TLS tunneling (not implemented, accepted for compatibility)
    #[arg(long, help = "Use TLS tunneling")]
    pub tls: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", help = "Log level")]
    pub log_level: String,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration and exit")]
    pub validate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    init_tracing(&args)?;

    if args.list_callbacks {
        print_callback_help();
        return Ok(());
    }

    info!("Starting rustap v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration with priority: CLI args > config file > environment > defaults
    let mut config = if args.config.exists() {
        ConfigManager::load_from_file(&args.config)?
    } else {
        info!("Config file not found, checking environment variables");
        ConfigManager::load_from_env()?
    };

    let transport = args
        .proto
        .as_deref()
        .map(|p| p.parse::<Transport>())
        .transpose()?;
    let callback = args
        .callback
        .as_deref()
        .map(|c| c.parse::<CallbackKind>())
        .transpose()?;

    config.merge_with_cli_args(
        args.rhost.as_deref(),
        args.rport,
        args.lhost.as_deref(),
        args.lport,
        transport,
        args.window_size,
        args.backlog,
        args.max_sessions,
        callback,
        args.tls,
    );

    config
        .validate()
        .context("Final configuration validation failed")?;

    if args.validate_config {
        info!("Configuration is valid");
        info!("Configuration summary:");
        info!("  Listen endpoint: {}:{} ({})", config.listen.host, config.listen.port, config.listen.transport);
        info!("  Remote endpoint: {}:{}", config.remote.host, config.remote.port);
        info!("  Window size: {} bytes", config.relay.window_size);
        info!("  Backlog: {}", config.listen.backlog);
        info!("  Max sessions: {}", config.relay.max_sessions);
        info!("  Callback: {}", config.intercept.callback);
        info!("  TLS: {}", if config.tls.enabled { "enabled" } else { "disabled" });
        return Ok(());
    }

    if config.intercept.callback == CallbackKind::Passthrough {
        info!("No interception callback selected, passing data through unaltered");
    }

    let shutdown_timeout = config.relay.shutdown_timeout;
    let coordinator = ShutdownCoordinator::new(shutdown_timeout);

    let engine = Engine::new(Arc::new(config));
    engine.start().await?;

    info!("Press Ctrl+C or send SIGTERM/SIGINT to shutdown gracefully");

    coordinator.listen_for_signals().await?;

    info!("Initiating graceful shutdown...");
    coordinator.shutdown(&engine).await;

    info!("Server shutdown complete");
    Ok(())
}

fn print_callback_help() {
    println!("Available callback functions:");
    println!("\tpassthrough:     Pass data through without alterations");
    println!("\tinteractive:     Interactive interception, prompts for every relayed chunk");
    println!("\tcustom:          Provide your own Intercept implementation through the library API");
}

/// Initialize tracing/logging
fn init_tracing(args: &CliArgs) -> Result<()> {
    let log_level = if args.verbose {
        "debug"
    } else {
        &args.log_level
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true),
        )
        .with(env_filter)
        .init();

    Ok(())
}
