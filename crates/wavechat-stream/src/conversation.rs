//! Conversation and message state.
//!
//! Conversations are owned externally (created through the collaborator
//! service) but mutated here during streaming: the streamed answer grows a
//! message in place, chunk by chunk, until the owning exchange finalizes it.
//!
//! Fragments carry no sequence numbers on the wire, and replay protection is
//! not this store's job: the connection manager's generation supersession
//! guarantees a single live socket feeds the pipeline, so appends arrive in
//! order and at most once. The store's own guard is finalization: a message
//! that stopped streaming rejects every further fragment.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use wavechat_core::{ConversationId, MessageId};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The human participant.
    User,
    /// The model.
    Assistant,
}

/// One message in a conversation.
#[derive(Debug, Clone)]
pub struct Message {
    /// Message identifier.
    pub id: MessageId,
    /// Author role.
    pub role: Role,
    /// Message text; append-only while streaming.
    pub content: String,
    /// When the message was created.
    pub created_at: DateTime<Utc>,
    /// True while chunks are still being applied.
    pub streaming: bool,
}

impl Message {
    fn user(id: MessageId, content: String) -> Self {
        Self {
            id,
            role: Role::User,
            content,
            created_at: Utc::now(),
            streaming: false,
        }
    }

    fn streaming_assistant(id: MessageId) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: String::new(),
            created_at: Utc::now(),
            streaming: true,
        }
    }
}

/// A conversation with its ordered message list.
#[derive(Debug, Clone)]
pub struct Conversation {
    /// Conversation identifier, assigned by the server.
    pub id: ConversationId,
    /// Human-readable title, if known.
    pub title: Option<String>,
    /// Ordered messages.
    pub messages: Vec<Message>,
}

/// Keyed collection of conversations, mutated by the coordinator during
/// streaming and read by consumers.
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: RwLock<HashMap<ConversationId, Conversation>>,
}

impl ConversationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a conversation if it is not already tracked.
    pub fn register(&self, id: ConversationId, title: Option<String>) {
        self.conversations
            .write()
            .entry(id.clone())
            .or_insert_with(|| Conversation {
                id,
                title,
                messages: Vec::new(),
            });
    }

    /// Whether a conversation with this id is tracked.
    #[must_use]
    pub fn contains(&self, id: &ConversationId) -> bool {
        self.conversations.read().contains_key(id)
    }

    /// Append a user message to a conversation.
    ///
    /// Returns the new message's id, or `None` if the conversation is
    /// unknown.
    pub fn push_user_message(
        &self,
        conversation_id: &ConversationId,
        content: impl Into<String>,
    ) -> Option<MessageId> {
        let mut conversations = self.conversations.write();
        let conversation = conversations.get_mut(conversation_id)?;
        let id = MessageId::generate();
        conversation.messages.push(Message::user(id, content.into()));
        Some(id)
    }

    /// Apply a streamed fragment to a message, creating the message entry on
    /// the first fragment.
    ///
    /// Appends are order-preserving per message. Fragments for a finalized
    /// message are late deliveries and are discarded.
    ///
    /// Returns whether the fragment was applied.
    pub fn apply_chunk(
        &self,
        conversation_id: &ConversationId,
        message_id: MessageId,
        fragment: &str,
    ) -> bool {
        let mut conversations = self.conversations.write();
        let Some(conversation) = conversations.get_mut(conversation_id) else {
            tracing::warn!(
                conversation_id = %conversation_id,
                "chunk discarded: unknown conversation"
            );
            return false;
        };

        let idx = match conversation.messages.iter().position(|m| m.id == message_id) {
            Some(idx) => idx,
            None => {
                conversation
                    .messages
                    .push(Message::streaming_assistant(message_id));
                conversation.messages.len() - 1
            }
        };
        let message = &mut conversation.messages[idx];

        if !message.streaming {
            tracing::warn!(
                conversation_id = %conversation_id,
                message_id = %message_id,
                "chunk discarded: message finalized"
            );
            return false;
        }

        message.content.push_str(fragment);
        true
    }

    /// Mark a message as no longer streaming.
    ///
    /// Subsequent `apply_chunk` calls for it are rejected.
    pub fn finalize_message(&self, conversation_id: &ConversationId, message_id: MessageId) {
        let mut conversations = self.conversations.write();
        if let Some(message) = conversations
            .get_mut(conversation_id)
            .and_then(|c| c.messages.iter_mut().find(|m| m.id == message_id))
        {
            message.streaming = false;
        }
    }

    /// Snapshot of a conversation and its messages.
    #[must_use]
    pub fn conversation(&self, id: &ConversationId) -> Option<Conversation> {
        self.conversations.read().get(id).cloned()
    }

    /// Snapshot of a single message.
    #[must_use]
    pub fn message(
        &self,
        conversation_id: &ConversationId,
        message_id: MessageId,
    ) -> Option<Message> {
        self.conversations
            .read()
            .get(conversation_id)?
            .messages
            .iter()
            .find(|m| m.id == message_id)
            .cloned()
    }

    /// Number of tracked conversations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.conversations.read().len()
    }

    /// Whether the store tracks no conversations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conversations.read().is_empty()
    }
}
