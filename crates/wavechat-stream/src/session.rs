//! Per-session streaming state.
//!
//! A `ReasoningSession` accumulates the chunked content of one streaming
//! exchange and derives timing/throughput metrics. The store is the single
//! subscriber-side owner of session state: it consumes typed events from the
//! connection manager and applies them under a short-lived lock.
//!
//! Late or duplicate events for a closed session are discarded with a
//! warning, never errored; a dropped connection that replays frames must not
//! corrupt finished sessions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use wavechat_core::{ConversationId, SessionId, StreamEvent};

/// Rough bytes-per-token divisor for the coarse token estimate.
const BYTES_PER_TOKEN: usize = 4;

/// Accumulated state of one streaming exchange.
#[derive(Debug, Clone)]
pub struct ReasoningSession {
    /// Session identifier, externally supplied.
    pub session_id: SessionId,
    /// Conversation the exchange belongs to; `None` until bound.
    pub conversation_id: Option<ConversationId>,
    /// Opaque metadata captured with the exchange, if any.
    pub metadata: Option<serde_json::Value>,
    /// Concatenation of all applied chunk fragments.
    pub content: String,
    /// True from creation until an explicit completion/error event.
    pub is_active: bool,
    /// When the session was created.
    pub started_at: DateTime<Utc>,
    /// When the session completed or failed; unset while active.
    pub ended_at: Option<DateTime<Utc>>,
    /// Number of chunk events applied.
    pub update_count: u64,
    /// Transient progress text (e.g. "searching..."), never part of content.
    pub status_text: Option<String>,
    /// Error text, set when the exchange failed.
    pub error: Option<String>,
}

impl ReasoningSession {
    fn new(
        session_id: SessionId,
        conversation_id: Option<ConversationId>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            session_id,
            conversation_id,
            metadata,
            content: String::new(),
            is_active: true,
            started_at: Utc::now(),
            ended_at: None,
            update_count: 0,
            status_text: None,
            error: None,
        }
    }

    /// Derive metrics as of `now`.
    ///
    /// Duration is recomputed lazily on every read rather than stored as a
    /// ticking value, so the store stays purely event-driven.
    #[must_use]
    pub fn metrics(&self, now: DateTime<Utc>) -> SessionMetrics {
        let end = self.ended_at.unwrap_or(now);
        let elapsed_ms = (end - self.started_at).num_milliseconds().max(0);
        #[allow(clippy::cast_precision_loss)]
        let duration_secs = elapsed_ms as f64 / 1000.0;

        SessionMetrics {
            duration_secs,
            update_count: self.update_count,
            token_estimate: u64::try_from(self.content.len().div_ceil(BYTES_PER_TOKEN))
                .unwrap_or(u64::MAX),
        }
    }
}

/// Derived per-session metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionMetrics {
    /// Seconds from session start to its end (or to `now` while active).
    pub duration_secs: f64,
    /// Number of chunk events applied.
    pub update_count: u64,
    /// Coarse token-count estimate derived from content length.
    pub token_estimate: u64,
}

/// Keyed collection of session state machines.
///
/// Sessions are evicted only by explicit action, never silently by the
/// connection manager, so history remains inspectable after streaming ends.
#[derive(Debug, Default)]
pub struct ReasoningSessionStore {
    sessions: RwLock<HashMap<SessionId, ReasoningSession>>,
}

impl ReasoningSessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new active session with empty content.
    ///
    /// Overwrites silently if the id already exists; callers are expected to
    /// generate fresh ids per exchange.
    pub fn create_session(
        &self,
        session_id: SessionId,
        conversation_id: Option<ConversationId>,
        metadata: Option<serde_json::Value>,
    ) {
        let session = ReasoningSession::new(session_id.clone(), conversation_id, metadata);
        self.sessions.write().insert(session_id, session);
    }

    /// Append a text fragment to an active session.
    ///
    /// A no-op for unknown or already-closed sessions: late and duplicate
    /// frames are benign and discarded with a warning.
    pub fn add_chunk(&self, session_id: &SessionId, fragment: &str) {
        let mut sessions = self.sessions.write();
        match sessions.get_mut(session_id) {
            Some(session) if session.is_active => {
                session.content.push_str(fragment);
                session.update_count += 1;
            }
            Some(_) => {
                tracing::warn!(session_id = %session_id, "chunk discarded: session closed");
            }
            None => {
                tracing::warn!(session_id = %session_id, "chunk discarded: unknown session");
            }
        }
    }

    /// Bind the conversation a session belongs to.
    pub fn bind_conversation(&self, session_id: &SessionId, conversation_id: ConversationId) {
        if let Some(session) = self.sessions.write().get_mut(session_id) {
            session.conversation_id = Some(conversation_id);
        }
    }

    /// Mark the session complete, freezing its content.
    pub fn complete_session(&self, session_id: &SessionId) {
        let mut sessions = self.sessions.write();
        if let Some(session) = sessions.get_mut(session_id) {
            if session.is_active {
                session.is_active = false;
                session.ended_at = Some(Utc::now());
                session.status_text = None;
            }
        } else {
            tracing::warn!(session_id = %session_id, "complete discarded: unknown session");
        }
    }

    /// Mark the session failed, freezing its content and recording the error.
    pub fn fail_session(&self, session_id: &SessionId, message: Option<String>) {
        let mut sessions = self.sessions.write();
        if let Some(session) = sessions.get_mut(session_id) {
            if session.is_active {
                session.is_active = false;
                session.ended_at = Some(Utc::now());
                session.status_text = None;
                session.error = message;
            }
        } else {
            tracing::warn!(session_id = %session_id, "error discarded: unknown session");
        }
    }

    /// Set transient progress text for an active session.
    ///
    /// Status frames for unknown sessions are treated as benign late
    /// delivery and discarded.
    pub fn set_status(&self, session_id: &SessionId, text: Option<String>) {
        let mut sessions = self.sessions.write();
        match sessions.get_mut(session_id) {
            Some(session) if session.is_active => session.status_text = text,
            Some(_) => {}
            None => {
                tracing::warn!(session_id = %session_id, "status discarded: unknown session");
            }
        }
    }

    /// Single entry point wired to the connection manager's event stream.
    pub fn handle_event(&self, event: &StreamEvent) {
        match event {
            StreamEvent::Connected {
                session_id,
                conversation_id,
                metadata,
            } => {
                // First open creates the session; a reconnect must not wipe
                // partial content, so existing sessions only pick up a late
                // conversation binding.
                if self.contains(session_id) {
                    if let Some(conversation_id) = conversation_id {
                        self.bind_conversation(session_id, conversation_id.clone());
                    }
                } else {
                    self.create_session(
                        session_id.clone(),
                        conversation_id.clone(),
                        metadata.clone(),
                    );
                }
            }
            StreamEvent::Chunk {
                session_id,
                content,
            } => self.add_chunk(session_id, content),
            StreamEvent::Status { session_id, text } => {
                self.set_status(session_id, text.clone());
            }
            StreamEvent::Completed { session_id } => self.complete_session(session_id),
            StreamEvent::Failed {
                session_id,
                message,
            } => self.fail_session(session_id, message.clone()),
            StreamEvent::Reconnecting { session_id, .. } => {
                self.set_status(session_id, Some("reconnecting...".to_string()));
            }
            StreamEvent::ConnectionFailed { session_id } => {
                self.fail_session(session_id, Some("connection failed".to_string()));
            }
            StreamEvent::Disconnected { .. } => {}
        }
    }

    /// Whether a session with this id exists.
    #[must_use]
    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    /// Snapshot of a session's current state.
    #[must_use]
    pub fn session(&self, session_id: &SessionId) -> Option<ReasoningSession> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Derived metrics for a session as of `now`.
    #[must_use]
    pub fn metrics(&self, session_id: &SessionId, now: DateTime<Utc>) -> Option<SessionMetrics> {
        self.sessions.read().get(session_id).map(|s| s.metrics(now))
    }

    /// Remove a session. Returns whether it existed.
    pub fn evict(&self, session_id: &SessionId) -> bool {
        self.sessions.write().remove(session_id).is_some()
    }

    /// Number of tracked sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether the store tracks no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
