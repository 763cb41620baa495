//! Networking: wire protocol and WebSocket transport

pub mod protocol;
pub mod transport;

pub use transport::{TransportError, TransportEvent};
