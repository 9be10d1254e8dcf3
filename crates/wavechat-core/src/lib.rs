//! Core types and the streaming wire protocol for wavechat.
//!
//! This crate provides the foundational types used throughout the wavechat
//! streaming layer:
//!
//! - **Identifiers**: Strongly-typed IDs for sessions, conversations, and messages
//! - **Wire protocol**: JSON frames exchanged over the persistent socket
//! - **Events**: The typed event surface emitted by the connection manager
//!
//! # Example
//!
//! ```
//! use wavechat_core::{SessionId, ConversationId, MessageId};
//!
//! // Generate a fresh session ID for a streaming exchange
//! let session_id = SessionId::generate();
//!
//! // Conversation IDs are assigned by the server and treated as opaque
//! let conversation_id = ConversationId::new("conv-42");
//!
//! // Message IDs are generated locally when a streamed answer starts
//! let message_id = MessageId::generate();
//! # let _ = (session_id, conversation_id, message_id);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod event;
pub mod ids;
pub mod protocol;

pub use error::ProtocolError;
pub use event::{ConnectionStatus, StreamEvent};
pub use ids::{ConversationId, IdError, MessageId, SessionId};
pub use protocol::{ClientFrame, ServerFrame, NORMAL_CLOSURE};
