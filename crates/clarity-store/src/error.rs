//! Error types for the history store.

use thiserror::Error;

/// A result type using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during history mutations.
///
/// Every error leaves the history untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The history has no messages.
    #[error("history is empty")]
    Empty,

    /// The last message is not an assistant message.
    #[error("last message is not an assistant message")]
    LastNotAssistant,

    /// The history was replaced after the reply or send was started.
    #[error("stale generation {expected}: history is at generation {current}")]
    StaleGeneration {
        /// Generation the caller started under.
        expected: u64,
        /// Generation the history is at now.
        current: u64,
    },

    /// Another message was appended after the reply placeholder.
    #[error("reply at index {0} is no longer the last message")]
    ReplyNotLast(usize),
}

impl StoreError {
    /// Returns true if the error only means the caller's view of the history is outdated.
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::StaleGeneration { .. })
    }
}
