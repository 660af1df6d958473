//! Data Relay Module
//!
//! Full-duplex forwarding between the inbound and outbound connection of a
//! session, one worker per direction.

pub mod io;
pub mod session;
pub mod worker;

pub use io::{RecvOutcome, RelaySink, RelaySource, SendOutcome};
pub use session::{Direction, Session};
pub use worker::RelayWorker;
