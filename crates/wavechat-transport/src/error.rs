//! Transport error types.

use thiserror::Error;

/// Errors produced by a socket transport.
///
/// These never reach the UI: open failures feed the reconnect path and send
/// failures are dropped with a warning by the connection manager.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The socket could not be constructed or opened.
    #[error("connection failed: {0}")]
    Connect(String),

    /// An outbound frame could not be delivered.
    #[error("send failed: {0}")]
    Send(String),
}
