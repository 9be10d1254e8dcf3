//! Streaming layer error types.

use thiserror::Error;

/// A result type using `StreamError`.
pub type Result<T> = std::result::Result<T, StreamError>;

/// Errors surfaced by the streaming coordination layer.
///
/// Transport and protocol failures are recovered locally and never appear
/// here; only conversation-creation failures propagate to callers, because a
/// pending send must not be silently swallowed.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The conversation-creation collaborator failed.
    #[error("conversation creation failed: {0}")]
    ConversationCreation(String),
}
