//! Typed events emitted by the connection manager.
//!
//! Inbound wire frames carry no session identifier; the manager attributes
//! each frame to the session its socket is bound to and republishes it as a
//! [`StreamEvent`]. Stores subscribe to these events and own their own
//! mutation, which keeps the manager independently testable.

use std::time::Duration;

use crate::ids::{ConversationId, SessionId};
use crate::protocol::ServerFrame;

/// Connection lifecycle state, published through a watch channel so
/// consumers can show connectivity without depending on manager internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No socket exists.
    #[default]
    Disconnected,
    /// A socket open (or reconnect) is in flight.
    Connecting,
    /// The socket is open and frames flow.
    Connected,
}

/// A typed event derived from the raw connection stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The socket opened and the initiation frame was sent.
    ///
    /// Carries the connect intent's conversation binding and metadata so
    /// subscribers can attribute the exchange without reaching into the
    /// manager.
    Connected {
        /// Session the socket is bound to.
        session_id: SessionId,
        /// Conversation the exchange belongs to, if already known.
        conversation_id: Option<ConversationId>,
        /// Opaque metadata captured with the intent.
        metadata: Option<serde_json::Value>,
    },
    /// An incremental text fragment arrived.
    Chunk {
        /// Session the fragment belongs to.
        session_id: SessionId,
        /// Text fragment to append.
        content: String,
    },
    /// Transient progress text arrived (not persisted to content).
    Status {
        /// Session the status belongs to.
        session_id: SessionId,
        /// Progress text, if the frame carried any.
        text: Option<String>,
    },
    /// The exchange completed; the session's content is final.
    Completed {
        /// Session that finished.
        session_id: SessionId,
    },
    /// The exchange failed server-side.
    Failed {
        /// Session that failed.
        session_id: SessionId,
        /// Error text, if the frame carried any.
        message: Option<String>,
    },
    /// The socket dropped abnormally and a retry is scheduled.
    Reconnecting {
        /// Session the retry is for.
        session_id: SessionId,
        /// Retry attempt number (1-indexed).
        attempt: u32,
        /// Delay before the retry fires.
        delay: Duration,
    },
    /// The reconnect budget is exhausted; no further automatic action.
    ConnectionFailed {
        /// Session the connection was bound to.
        session_id: SessionId,
    },
    /// The socket closed cleanly (or was explicitly disconnected).
    Disconnected {
        /// Session the socket was bound to.
        session_id: SessionId,
    },
}

impl StreamEvent {
    /// Attribute an inbound frame to the bound session.
    #[must_use]
    pub fn from_frame(session_id: SessionId, frame: ServerFrame) -> Self {
        match frame {
            ServerFrame::Chunk { content } => Self::Chunk {
                session_id,
                content,
            },
            ServerFrame::Status { content, .. } => Self::Status {
                session_id,
                text: content,
            },
            ServerFrame::Complete { .. } => Self::Completed { session_id },
            ServerFrame::Error { content, .. } => Self::Failed {
                session_id,
                message: content,
            },
        }
    }

    /// The session this event belongs to.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::Connected { session_id, .. }
            | Self::Chunk { session_id, .. }
            | Self::Status { session_id, .. }
            | Self::Completed { session_id }
            | Self::Failed { session_id, .. }
            | Self::Reconnecting { session_id, .. }
            | Self::ConnectionFailed { session_id }
            | Self::Disconnected { session_id } => session_id,
        }
    }
}
