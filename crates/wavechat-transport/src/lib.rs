//! Socket transport layer for wavechat.
//!
//! This crate separates the communication mechanism from chat semantics.
//! The [`SocketTransport`] trait is the dependency-injection seam: the
//! production implementation ([`WsTransport`]) speaks WebSocket via
//! `tokio-tungstenite`, while tests substitute a scripted fake. A transport
//! knows nothing about sessions or conversations; it only opens sockets,
//! forwards text frames, and reports closures.
//!
//! [`ReconnectPolicy`] lives here as well: a pure attempt-to-delay function
//! with a bounded budget, kept free of timers and I/O so it is unit-testable
//! in isolation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod policy;
pub mod socket;
pub mod ws;

pub use error::TransportError;
pub use policy::ReconnectPolicy;
pub use socket::{InboundFrame, SocketTransport, TransportHandle};
pub use ws::WsTransport;
