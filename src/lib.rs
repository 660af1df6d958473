//! rustap
//!
//! An intercepting network relay: accepts connections on a local endpoint,
//! opens a matching connection to a remote endpoint, and forwards bytes in
//! both directions while letting a pluggable callback inspect and rewrite
//! every chunk in flight. Built for protocol inspection, fuzzing, and manual
//! traffic tampering.

pub mod config;
pub mod engine;
pub mod intercept;
pub mod relay;
pub mod shutdown;

pub use config::Config;
pub use engine::Engine;
pub use intercept::{CallbackKind, Intercept, Payload};
pub use shutdown::ShutdownCoordinator;

/// Common error type for the relay
pub type Result<T> = anyhow::Result<T>;
