//! Value types handed out by the history store.

use clarity_core::Message;

/// Change notification published by [`HistoryStore`](crate::HistoryStore).
///
/// Events are published in the same order the mutations were applied, so a
/// renderer that applies them in order reconstructs the history exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEvent {
    /// A message was added at `index`.
    Appended {
        /// Position of the new message.
        index: usize,
        /// The message as appended.
        message: Message,
    },
    /// Text was concatenated onto the assistant message at `index`.
    Extended {
        /// Position of the extended message.
        index: usize,
        /// The appended text, verbatim.
        delta: String,
    },
    /// The whole history was swapped out.
    Replaced {
        /// The new history.
        messages: Vec<Message>,
    },
}

/// Handle to an assistant reply placeholder.
///
/// Returned by [`HistoryStore::start_assistant_reply`](crate::HistoryStore::start_assistant_reply).
/// Deltas written through the handle are rejected once the history has been
/// replaced, which keeps tokens from a superseded stream out of the new history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHandle {
    pub(crate) generation: u64,
    pub(crate) index: usize,
}

impl ReplyHandle {
    /// Generation of the history the reply was started in.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Position of the reply in the history.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }
}
