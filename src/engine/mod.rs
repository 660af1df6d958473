//! Relay Engine Module
//!
//! Connection acceptance and coordinated start/stop lifecycle.

pub mod acceptor;
pub mod controller;

pub use controller::Engine;
