//! Data Interception Module
//!
//! The pluggable transformation applied to every chunk of relayed data, the
//! built-in passthrough and interactive callbacks, and the ASCII-hex codec
//! used by the interactive edit sub-protocol.

pub mod callback;
pub mod console;
pub mod dump;
pub mod hex;
pub mod interactive;

pub use callback::{CallbackKind, Intercept, Passthrough, Payload};
pub use console::{Console, StdioConsole};
pub use interactive::Interactive;
