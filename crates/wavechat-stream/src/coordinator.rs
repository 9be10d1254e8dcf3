//! Conversation stream coordination.
//!
//! Bridges "user pressed send" and "a conversation exists to attach the
//! streamed answer to". Conversation creation is a network round-trip, and a
//! second send can arrive before the first creation resolves; creation is
//! therefore serialized behind a single-flight lock so exactly one creation
//! call happens per "no active conversation" episode and every queued caller
//! observes the same id.
//!
//! Each send runs through a small per-exchange state machine:
//!
//! ```text
//! Idle -> AwaitingConversation -> Streaming -> Complete
//!                 |                   |
//!                 +------> Aborted <--+   (cancel / terminal failure)
//! ```
//!
//! Aborting preserves already-applied chunks: partial answers stay visible.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use wavechat_core::{ConversationId, MessageId, SessionId, StreamEvent};

use crate::conversation::ConversationStore;
use crate::error::Result;
use crate::service::ConversationService;

/// Lifecycle of one streaming exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExchangePhase {
    /// No exchange for this session.
    #[default]
    Idle,
    /// Send issued; waiting for a conversation id to bind.
    AwaitingConversation,
    /// Conversation bound; chunks are being applied.
    Streaming,
    /// Completion event received; terminal.
    Complete,
    /// Cancelled or failed terminally; terminal. Applied chunks survive.
    Aborted,
}

/// Per-exchange bookkeeping.
#[derive(Debug, Default)]
struct Exchange {
    conversation_id: Option<ConversationId>,
    message_id: Option<MessageId>,
    phase: ExchangePhase,
}

/// Resolves conversation identity for streams and applies streamed content
/// as incremental message mutations.
pub struct ConversationStreamCoordinator {
    service: Arc<dyn ConversationService>,
    conversations: ConversationStore,
    exchanges: RwLock<HashMap<SessionId, Exchange>>,
    /// Single-flight guard for conversation creation.
    creation_lock: Mutex<()>,
    /// The conversation concurrent sends share while none existed.
    active_conversation: RwLock<Option<ConversationId>>,
}

impl ConversationStreamCoordinator {
    /// Create a coordinator backed by the given creation service.
    #[must_use]
    pub fn new(service: Arc<dyn ConversationService>) -> Self {
        Self {
            service,
            conversations: ConversationStore::new(),
            exchanges: RwLock::new(HashMap::new()),
            creation_lock: Mutex::new(()),
            active_conversation: RwLock::new(None),
        }
    }

    /// The conversation/message state this coordinator mutates.
    #[must_use]
    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    /// Resolve the conversation a send belongs to, creating one if absent.
    ///
    /// A present candidate is registered and returned immediately. With no
    /// candidate, callers serialize behind the single-flight lock: the first
    /// performs the one creation call, everyone queued behind it observes
    /// the freshly created id.
    ///
    /// # Errors
    ///
    /// Returns an error if the creation collaborator fails; the pending send
    /// is not silently swallowed.
    pub async fn ensure_conversation(
        &self,
        candidate: Option<ConversationId>,
        title: &str,
    ) -> Result<ConversationId> {
        if let Some(id) = candidate {
            self.conversations.register(id.clone(), None);
            *self.active_conversation.write() = Some(id.clone());
            return Ok(id);
        }

        if let Some(id) = self.active_conversation.read().clone() {
            return Ok(id);
        }

        let _guard = self.creation_lock.lock().await;

        // A queued caller arrives here after the winner finished creating
        if let Some(id) = self.active_conversation.read().clone() {
            return Ok(id);
        }

        let created = self.service.create_conversation(title).await?;
        tracing::info!(conversation_id = %created.conversation_id, "conversation created");

        self.conversations
            .register(created.conversation_id.clone(), Some(created.title));
        *self.active_conversation.write() = Some(created.conversation_id.clone());
        Ok(created.conversation_id)
    }

    /// Start an exchange for a freshly issued send.
    pub fn begin_exchange(&self, session_id: SessionId) {
        let exchange = Exchange {
            phase: ExchangePhase::AwaitingConversation,
            ..Exchange::default()
        };
        self.exchanges.write().insert(session_id, exchange);
    }

    /// Bind a resolved conversation to an exchange and record the user's
    /// message.
    ///
    /// Fires the `AwaitingConversation -> Streaming` transition; returns the
    /// id of the appended user message, or `None` if the exchange is not
    /// awaiting a conversation (e.g. it was cancelled while creation was in
    /// flight).
    pub fn bind_conversation(
        &self,
        session_id: &SessionId,
        conversation_id: ConversationId,
        user_message: &str,
    ) -> Option<MessageId> {
        let mut exchanges = self.exchanges.write();
        let Some(exchange) = exchanges.get_mut(session_id) else {
            tracing::warn!(session_id = %session_id, "bind ignored: unknown exchange");
            return None;
        };
        if exchange.phase != ExchangePhase::AwaitingConversation {
            tracing::warn!(
                session_id = %session_id,
                phase = ?exchange.phase,
                "bind ignored: exchange not awaiting conversation"
            );
            return None;
        }

        self.conversations.register(conversation_id.clone(), None);
        let message_id = self
            .conversations
            .push_user_message(&conversation_id, user_message);

        exchange.conversation_id = Some(conversation_id);
        exchange.phase = ExchangePhase::Streaming;
        message_id
    }

    /// Apply a streamed fragment to the exchange's assistant message,
    /// creating the message on the first fragment.
    pub fn apply_chunk(&self, session_id: &SessionId, fragment: &str) {
        let mut exchanges = self.exchanges.write();
        let Some(exchange) = exchanges.get_mut(session_id) else {
            tracing::warn!(session_id = %session_id, "chunk discarded: unknown exchange");
            return;
        };
        if exchange.phase != ExchangePhase::Streaming {
            tracing::warn!(
                session_id = %session_id,
                phase = ?exchange.phase,
                "chunk discarded: exchange not streaming"
            );
            return;
        }
        let Some(conversation_id) = exchange.conversation_id.clone() else {
            tracing::warn!(session_id = %session_id, "chunk discarded: no conversation bound");
            return;
        };

        let message_id = *exchange.message_id.get_or_insert_with(MessageId::generate);
        self.conversations
            .apply_chunk(&conversation_id, message_id, fragment);
    }

    /// Finish an exchange: `Streaming -> Complete`, finalizing the streamed
    /// message. Idempotent for already-terminal exchanges.
    pub fn complete_exchange(&self, session_id: &SessionId) {
        let mut exchanges = self.exchanges.write();
        let Some(exchange) = exchanges.get_mut(session_id) else {
            tracing::warn!(session_id = %session_id, "complete discarded: unknown exchange");
            return;
        };
        match exchange.phase {
            ExchangePhase::Complete | ExchangePhase::Aborted => {}
            _ => {
                Self::finalize(&self.conversations, exchange);
                exchange.phase = ExchangePhase::Complete;
            }
        }
    }

    /// Abort an exchange on cancel or unrecoverable connection failure.
    ///
    /// Already-applied chunks are left intact; the streamed message is
    /// finalized with its partial content.
    pub fn abort_exchange(&self, session_id: &SessionId) {
        let mut exchanges = self.exchanges.write();
        let Some(exchange) = exchanges.get_mut(session_id) else {
            return;
        };
        match exchange.phase {
            ExchangePhase::AwaitingConversation | ExchangePhase::Streaming => {
                Self::finalize(&self.conversations, exchange);
                exchange.phase = ExchangePhase::Aborted;
            }
            _ => {}
        }
    }

    /// User-initiated cancellation of one exchange.
    ///
    /// Per-exchange, not per-socket: the shared connection is left alone in
    /// case other sessions still use it.
    pub fn cancel(&self, session_id: &SessionId) {
        tracing::info!(session_id = %session_id, "exchange cancelled");
        self.abort_exchange(session_id);
    }

    /// Current phase of a session's exchange (`Idle` if none exists).
    #[must_use]
    pub fn phase(&self, session_id: &SessionId) -> ExchangePhase {
        self.exchanges
            .read()
            .get(session_id)
            .map_or(ExchangePhase::Idle, |e| e.phase)
    }

    /// The conversation and message an exchange streams into, once known.
    #[must_use]
    pub fn streamed_message(
        &self,
        session_id: &SessionId,
    ) -> Option<(ConversationId, MessageId)> {
        let exchanges = self.exchanges.read();
        let exchange = exchanges.get(session_id)?;
        Some((exchange.conversation_id.clone()?, exchange.message_id?))
    }

    /// Single entry point wired to the connection manager's event stream.
    pub fn handle_event(&self, event: &StreamEvent) {
        match event {
            StreamEvent::Chunk {
                session_id,
                content,
            } => self.apply_chunk(session_id, content),
            StreamEvent::Completed { session_id } => self.complete_exchange(session_id),
            StreamEvent::Failed { session_id, .. }
            | StreamEvent::ConnectionFailed { session_id } => self.abort_exchange(session_id),
            StreamEvent::Connected { .. }
            | StreamEvent::Status { .. }
            | StreamEvent::Reconnecting { .. }
            | StreamEvent::Disconnected { .. } => {}
        }
    }

    fn finalize(conversations: &ConversationStore, exchange: &Exchange) {
        if let (Some(conversation_id), Some(message_id)) =
            (exchange.conversation_id.as_ref(), exchange.message_id)
        {
            conversations.finalize_message(conversation_id, message_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::error::StreamError;
    use crate::service::CreatedConversation;

    /// Counts creation calls and resolves after a simulated round-trip.
    struct CountingService {
        calls: AtomicU32,
        delay: Duration,
    }

    impl CountingService {
        fn new(delay: Duration) -> Self {
            Self {
                calls: AtomicU32::new(0),
                delay,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ConversationService for CountingService {
        async fn create_conversation(&self, title: &str) -> crate::error::Result<CreatedConversation> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(CreatedConversation {
                conversation_id: ConversationId::new(format!("c-{n}")),
                title: title.to_string(),
            })
        }
    }

    struct FailingService;

    #[async_trait]
    impl ConversationService for FailingService {
        async fn create_conversation(&self, _title: &str) -> crate::error::Result<CreatedConversation> {
            Err(StreamError::ConversationCreation("boom".to_string()))
        }
    }

    fn sid() -> SessionId {
        SessionId::new("s-1")
    }

    // =========================================================================
    // Single-Flight Conversation Creation
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn concurrent_sends_share_one_creation_call() {
        let service = Arc::new(CountingService::new(Duration::from_millis(50)));
        let coordinator = ConversationStreamCoordinator::new(service.clone());

        let (a, b) = tokio::join!(
            coordinator.ensure_conversation(None, "New chat"),
            coordinator.ensure_conversation(None, "New chat"),
        );

        assert_eq!(service.calls(), 1);
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[tokio::test]
    async fn known_candidate_short_circuits() {
        let service = Arc::new(CountingService::new(Duration::ZERO));
        let coordinator = ConversationStreamCoordinator::new(service.clone());

        let id = coordinator
            .ensure_conversation(Some(ConversationId::new("c-known")), "ignored")
            .await
            .unwrap();

        assert_eq!(id, ConversationId::new("c-known"));
        assert_eq!(service.calls(), 0);
        assert!(coordinator.conversations().contains(&id));
    }

    #[tokio::test]
    async fn later_sends_reuse_the_created_conversation() {
        let service = Arc::new(CountingService::new(Duration::ZERO));
        let coordinator = ConversationStreamCoordinator::new(service.clone());

        let first = coordinator.ensure_conversation(None, "t").await.unwrap();
        let second = coordinator.ensure_conversation(None, "t").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn creation_failure_is_surfaced_and_retryable() {
        let coordinator = ConversationStreamCoordinator::new(Arc::new(FailingService));

        let result = coordinator.ensure_conversation(None, "t").await;
        assert!(matches!(result, Err(StreamError::ConversationCreation(_))));

        // The failed episode did not poison the single-flight state
        let result = coordinator.ensure_conversation(None, "t").await;
        assert!(matches!(result, Err(StreamError::ConversationCreation(_))));
    }

    // =========================================================================
    // Exchange State Machine
    // =========================================================================

    #[tokio::test]
    async fn full_exchange_lifecycle() {
        let coordinator = ConversationStreamCoordinator::new(Arc::new(FailingService));
        let conversation_id = ConversationId::new("c-1");

        assert_eq!(coordinator.phase(&sid()), ExchangePhase::Idle);

        coordinator.begin_exchange(sid());
        assert_eq!(coordinator.phase(&sid()), ExchangePhase::AwaitingConversation);

        let user_message_id = coordinator
            .bind_conversation(&sid(), conversation_id.clone(), "Hello")
            .unwrap();
        assert_eq!(coordinator.phase(&sid()), ExchangePhase::Streaming);

        coordinator.apply_chunk(&sid(), "He");
        coordinator.apply_chunk(&sid(), "llo");
        coordinator.apply_chunk(&sid(), "!");
        coordinator.complete_exchange(&sid());
        assert_eq!(coordinator.phase(&sid()), ExchangePhase::Complete);

        let (conv, msg) = coordinator.streamed_message(&sid()).unwrap();
        assert_eq!(conv, conversation_id);

        let conversation = coordinator.conversations().conversation(&conversation_id).unwrap();
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(conversation.messages[0].id, user_message_id);
        assert_eq!(conversation.messages[0].content, "Hello");

        let answer = coordinator.conversations().message(&conv, msg).unwrap();
        assert_eq!(answer.content, "Hello!");
        assert!(!answer.streaming);
    }

    #[tokio::test]
    async fn chunk_after_complete_is_rejected() {
        let coordinator = ConversationStreamCoordinator::new(Arc::new(FailingService));
        coordinator.begin_exchange(sid());
        coordinator.bind_conversation(&sid(), ConversationId::new("c-1"), "Hi");
        coordinator.apply_chunk(&sid(), "done");
        coordinator.complete_exchange(&sid());

        coordinator.apply_chunk(&sid(), " late");

        let (conv, msg) = coordinator.streamed_message(&sid()).unwrap();
        let answer = coordinator.conversations().message(&conv, msg).unwrap();
        assert_eq!(answer.content, "done");
    }

    #[tokio::test]
    async fn abort_preserves_partial_content() {
        let coordinator = ConversationStreamCoordinator::new(Arc::new(FailingService));
        coordinator.begin_exchange(sid());
        coordinator.bind_conversation(&sid(), ConversationId::new("c-1"), "Hi");
        coordinator.apply_chunk(&sid(), "par");
        coordinator.apply_chunk(&sid(), "tial");

        coordinator.cancel(&sid());
        assert_eq!(coordinator.phase(&sid()), ExchangePhase::Aborted);

        coordinator.apply_chunk(&sid(), " more");

        let (conv, msg) = coordinator.streamed_message(&sid()).unwrap();
        let answer = coordinator.conversations().message(&conv, msg).unwrap();
        assert_eq!(answer.content, "partial");
        assert!(!answer.streaming);
    }

    #[tokio::test]
    async fn cancel_while_awaiting_conversation_blocks_bind() {
        let coordinator = ConversationStreamCoordinator::new(Arc::new(FailingService));
        coordinator.begin_exchange(sid());

        coordinator.cancel(&sid());
        assert_eq!(coordinator.phase(&sid()), ExchangePhase::Aborted);

        // Creation resolved after the cancel; the exchange must stay aborted
        let bound = coordinator.bind_conversation(&sid(), ConversationId::new("c-1"), "Hi");
        assert!(bound.is_none());
        assert_eq!(coordinator.phase(&sid()), ExchangePhase::Aborted);
    }

    #[tokio::test]
    async fn terminal_events_are_idempotent() {
        let coordinator = ConversationStreamCoordinator::new(Arc::new(FailingService));
        coordinator.begin_exchange(sid());
        coordinator.bind_conversation(&sid(), ConversationId::new("c-1"), "Hi");
        coordinator.complete_exchange(&sid());

        // A late abort (e.g. duplicate error frame) must not undo completion
        coordinator.abort_exchange(&sid());
        assert_eq!(coordinator.phase(&sid()), ExchangePhase::Complete);
    }

    #[tokio::test]
    async fn handle_event_routes_failures_to_abort() {
        let coordinator = ConversationStreamCoordinator::new(Arc::new(FailingService));
        coordinator.begin_exchange(sid());
        coordinator.bind_conversation(&sid(), ConversationId::new("c-1"), "Hi");

        coordinator.handle_event(&StreamEvent::Chunk {
            session_id: sid(),
            content: "part".to_string(),
        });
        coordinator.handle_event(&StreamEvent::Failed {
            session_id: sid(),
            message: Some("boom".to_string()),
        });

        assert_eq!(coordinator.phase(&sid()), ExchangePhase::Aborted);
        let (conv, msg) = coordinator.streamed_message(&sid()).unwrap();
        let answer = coordinator.conversations().message(&conv, msg).unwrap();
        assert_eq!(answer.content, "part");
    }
}
