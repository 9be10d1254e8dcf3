//! Immutable connection intent.
//!
//! Everything the manager needs to (re)establish a streaming exchange is
//! captured once at connect time and threaded unchanged through every retry.
//! This avoids stale-field bugs if a new send changes provider or model
//! between reconnect attempts: the old connection keeps its own record.

use wavechat_core::{ClientFrame, ConversationId, SessionId};

/// The full context of one streaming exchange, captured at connect time.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectIntent {
    /// Session this exchange streams under.
    pub session_id: SessionId,
    /// Conversation the streamed answer belongs to, if already known.
    pub conversation_id: Option<ConversationId>,
    /// The user message that triggered the exchange.
    pub message: String,
    /// Model identifier.
    pub model: String,
    /// Provider identifier.
    pub provider: String,
    /// Whether web search is enabled.
    pub web_search: bool,
    /// Search provider, when web search is enabled.
    pub search_provider: Option<String>,
    /// Whether extended reasoning is requested.
    pub deep_thinking_mode: bool,
    /// Opaque metadata forwarded to the server.
    pub metadata: Option<serde_json::Value>,
}

impl ConnectIntent {
    /// Capture an intent with search and reasoning options disabled.
    #[must_use]
    pub fn new(
        session_id: SessionId,
        conversation_id: Option<ConversationId>,
        message: impl Into<String>,
        model: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            session_id,
            conversation_id,
            message: message.into(),
            model: model.into(),
            provider: provider.into(),
            web_search: false,
            search_provider: None,
            deep_thinking_mode: false,
            metadata: None,
        }
    }

    /// Enable web search with the given search provider.
    #[must_use]
    pub fn with_web_search(mut self, search_provider: impl Into<String>) -> Self {
        self.web_search = true;
        self.search_provider = Some(search_provider.into());
        self
    }

    /// Request extended reasoning.
    #[must_use]
    pub fn with_deep_thinking(mut self) -> Self {
        self.deep_thinking_mode = true;
        self
    }

    /// Attach opaque metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Build the initiation frame sent immediately after the socket opens.
    #[must_use]
    pub fn initiation_frame(&self) -> ClientFrame {
        ClientFrame::Chat {
            session_id: self.session_id.clone(),
            message: self.message.clone(),
            model: self.model.clone(),
            provider: self.provider.clone(),
            conversation_id: self.conversation_id.clone(),
            web_search: self.web_search,
            search_provider: self.search_provider.clone(),
            deep_thinking_mode: self.deep_thinking_mode,
            metadata: self.metadata.clone(),
        }
    }
}
