//! Real-time streaming coordination for wavechat.
//!
//! This crate is the layer between the raw socket transport and a chat UI:
//! it keeps one persistent connection alive across drops
//! ([`StreamingConnectionManager`]), tracks per-session reasoning output and
//! its derived metrics ([`ReasoningSessionStore`]), and resolves the
//! conversation-identity race that arises when streaming starts before the
//! backing conversation exists ([`ConversationStreamCoordinator`]).
//!
//! The three pieces are deliberately decoupled: the manager publishes typed
//! [`StreamEvent`]s (re-exported from `wavechat-core`) on a broadcast
//! channel, and the stores subscribe and own their own mutation. Any piece
//! is usable and testable without the others.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod conversation;
pub mod coordinator;
pub mod error;
pub mod intent;
pub mod manager;
pub mod service;
pub mod session;

pub use config::StreamConfig;
pub use conversation::{Conversation, ConversationStore, Message, Role};
pub use coordinator::{ConversationStreamCoordinator, ExchangePhase};
pub use error::{Result, StreamError};
pub use intent::ConnectIntent;
pub use manager::{ConnectionState, StreamingConnectionManager};
pub use service::{ConversationService, CreatedConversation, HttpConversationService};
pub use session::{ReasoningSession, ReasoningSessionStore, SessionMetrics};

pub use wavechat_core::{ConnectionStatus, StreamEvent};
