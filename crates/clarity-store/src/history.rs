//! The history store implementation.

use clarity_core::Message;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::error::{Result, StoreError};
use crate::types::{HistoryEvent, ReplyHandle};

/// Number of change events buffered per subscriber.
///
/// A subscriber that falls further behind receives `RecvError::Lagged` and
/// should resynchronise from [`HistoryStore::snapshot`].
pub const EVENT_BUFFER: usize = 1024;

struct Inner {
    messages: Vec<Message>,
    generation: u64,
}

/// Ordered, append-only conversation history.
///
/// The store performs no cross-call validation beyond the preconditions of each
/// operation. Exclusivity of the pending reply is the caller's job.
pub struct HistoryStore {
    inner: RwLock<Inner>,
    events: broadcast::Sender<HistoryEvent>,
}

impl HistoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_messages(Vec::new())
    }

    /// Create a store seeded with `messages`.
    #[must_use]
    pub fn with_messages(messages: Vec<Message>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: RwLock::new(Inner {
                messages,
                generation: 0,
            }),
            events,
        }
    }

    /// Subscribe to change events.
    ///
    /// Only mutations made after this call are delivered.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.events.subscribe()
    }

    // Published under the write lock so event order matches mutation order.
    fn publish(&self, event: HistoryEvent) {
        let _ = self.events.send(event);
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Append a message to the end of the history.
    ///
    /// Returns the index of the new message.
    pub fn append(&self, message: Message) -> usize {
        let mut inner = self.inner.write();
        inner.messages.push(message.clone());
        let index = inner.messages.len() - 1;
        self.publish(HistoryEvent::Appended { index, message });
        index
    }

    /// Append `message` only if the history is still at `generation`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::StaleGeneration` if the history was replaced since.
    pub fn append_if_current(&self, generation: u64, message: Message) -> Result<usize> {
        let mut inner = self.inner.write();
        if inner.generation != generation {
            return Err(StoreError::StaleGeneration {
                expected: generation,
                current: inner.generation,
            });
        }
        inner.messages.push(message.clone());
        let index = inner.messages.len() - 1;
        self.publish(HistoryEvent::Appended { index, message });
        Ok(index)
    }

    /// Append an empty assistant message to be filled by streamed tokens.
    pub fn start_assistant_reply(&self) -> ReplyHandle {
        let mut inner = self.inner.write();
        self.push_reply(&mut inner)
    }

    /// Start an assistant reply only if the history is still at `generation`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::StaleGeneration` if the history was replaced since.
    pub fn start_reply_if_current(&self, generation: u64) -> Result<ReplyHandle> {
        let mut inner = self.inner.write();
        if inner.generation != generation {
            return Err(StoreError::StaleGeneration {
                expected: generation,
                current: inner.generation,
            });
        }
        Ok(self.push_reply(&mut inner))
    }

    fn push_reply(&self, inner: &mut Inner) -> ReplyHandle {
        inner.messages.push(Message::assistant(""));
        let index = inner.messages.len() - 1;
        self.publish(HistoryEvent::Appended {
            index,
            message: Message::assistant(""),
        });
        ReplyHandle {
            generation: inner.generation,
            index,
        }
    }

    /// Concatenate `delta` onto the last message, which must be an assistant message.
    ///
    /// The delta is appended verbatim.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Empty` or `StoreError::LastNotAssistant` if the
    /// precondition does not hold.
    pub fn append_to_last(&self, delta: &str) -> Result<()> {
        let mut inner = self.inner.write();
        let index = inner.messages.len().checked_sub(1).ok_or(StoreError::Empty)?;
        Self::extend(&mut inner.messages[index], delta)?;
        self.publish(HistoryEvent::Extended {
            index,
            delta: delta.to_string(),
        });
        Ok(())
    }

    /// Concatenate `delta` onto the reply identified by `handle`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::StaleGeneration` if the history was replaced after the
    /// reply was started, and `StoreError::ReplyNotLast` if another message has
    /// been appended after it.
    pub fn append_to_reply(&self, handle: &ReplyHandle, delta: &str) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.generation != handle.generation {
            return Err(StoreError::StaleGeneration {
                expected: handle.generation,
                current: inner.generation,
            });
        }
        if inner.messages.len() != handle.index + 1 {
            return Err(StoreError::ReplyNotLast(handle.index));
        }
        Self::extend(&mut inner.messages[handle.index], delta)?;
        self.publish(HistoryEvent::Extended {
            index: handle.index,
            delta: delta.to_string(),
        });
        Ok(())
    }

    fn extend(message: &mut Message, delta: &str) -> Result<()> {
        if !message.is_assistant() {
            return Err(StoreError::LastNotAssistant);
        }
        message.content.push_str(delta);
        Ok(())
    }

    /// Discard the history and install `messages` in its place.
    ///
    /// Returns the new generation.
    pub fn replace_all(&self, messages: Vec<Message>) -> u64 {
        let mut inner = self.inner.write();
        inner.messages.clone_from(&messages);
        inner.generation += 1;
        tracing::trace!(generation = inner.generation, len = messages.len(), "History replaced");
        self.publish(HistoryEvent::Replaced { messages });
        inner.generation
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Copy of the current history.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.inner.read().messages.clone()
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().messages.len()
    }

    /// Whether the history has no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().messages.is_empty()
    }

    /// Copy of the last message, if any.
    #[must_use]
    pub fn last(&self) -> Option<Message> {
        self.inner.read().messages.last().cloned()
    }

    /// Current generation; bumped by every [`replace_all`](Self::replace_all).
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("HistoryStore")
            .field("len", &inner.messages.len())
            .field("generation", &inner.generation)
            .finish_non_exhaustive()
    }
}
