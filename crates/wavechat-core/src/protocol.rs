//! Streaming wire protocol frames.
//!
//! JSON frames exchanged with the streaming endpoint over the persistent
//! socket. The outbound vocabulary is a single initiation frame; the inbound
//! vocabulary is limited to what streaming requires: incremental chunks,
//! transient status text, completion, and errors.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::ids::{ConversationId, SessionId};

/// WebSocket close code signalling a clean, intentional closure.
///
/// Any other close code (or an unclean drop) triggers the reconnect policy.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Client -> Server: frames sent to the streaming endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    /// Initiation frame carrying the triggering message and provider context.
    ///
    /// Sent immediately after the socket opens, and re-sent on every
    /// reconnect with the same captured intent.
    #[serde(rename_all = "camelCase")]
    Chat {
        /// Session ID this exchange streams under.
        session_id: SessionId,
        /// The user message that triggered the exchange.
        message: String,
        /// Model identifier.
        model: String,
        /// Provider identifier.
        provider: String,
        /// Conversation the streamed answer belongs to, if already known.
        conversation_id: Option<ConversationId>,
        /// Whether web search is enabled for this exchange.
        web_search: bool,
        /// Search provider, when web search is enabled.
        #[serde(skip_serializing_if = "Option::is_none")]
        search_provider: Option<String>,
        /// Whether extended reasoning is requested.
        deep_thinking_mode: bool,
        /// Opaque metadata forwarded to the server.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Value>,
    },
}

impl ClientFrame {
    /// Serialize the frame to its wire representation.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails (practically impossible
    /// for these types).
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Server -> Client: frames received from the streaming endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    /// An incremental fragment of model-generated text.
    Chunk {
        /// Text fragment to append.
        content: String,
    },
    /// Transient progress text (e.g. "searching..."), never persisted.
    Status {
        /// Progress text, if any.
        #[serde(default)]
        content: Option<String>,
        /// Structured progress payload, if any.
        #[serde(default)]
        data: Option<serde_json::Value>,
    },
    /// The exchange finished; the session's content is final.
    Complete {
        /// Completion payload, if any.
        #[serde(default)]
        data: Option<serde_json::Value>,
    },
    /// The exchange failed; the session is frozen with an error.
    Error {
        /// Error text, if any.
        #[serde(default)]
        content: Option<String>,
        /// Structured error payload, if any.
        #[serde(default)]
        data: Option<serde_json::Value>,
    },
}

impl ServerFrame {
    /// Decode an inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] carrying a truncated copy of the frame
    /// text if it is not valid JSON or does not match the frame schema.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::malformed(e, text))
    }
}
