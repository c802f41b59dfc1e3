//! In-memory conversation history for the Clarity chat client.
//!
//! The [`HistoryStore`] is the single owner of a session's ordered message
//! history. The chat session writes to it, renderers observe it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐ append / start_reply ┌──────────────────┐
//! │   ChatSession    │─────────────────────▶│   HistoryStore   │
//! │   (read loop)    │ append_to_reply      │  RwLock<history> │
//! └──────────────────┘                      └────────┬─────────┘
//!                                                    │ HistoryEvent
//!                                           ┌────────▼─────────┐
//!                                           │    Renderer      │
//!                                           │  (subscriber)    │
//!                                           └──────────────────┘
//! ```
//!
//! Every [`HistoryStore::replace_all`] bumps a generation counter. Writers that
//! started under an older generation get [`StoreError::StaleGeneration`] instead
//! of touching the new history.
//!
//! # Example
//!
//! ```
//! use clarity_core::Message;
//! use clarity_store::HistoryStore;
//!
//! let store = HistoryStore::new();
//! store.append(Message::user("2+2?"));
//!
//! let reply = store.start_assistant_reply();
//! store.append_to_reply(&reply, "4").unwrap();
//!
//! assert_eq!(store.snapshot(), vec![Message::user("2+2?"), Message::assistant("4")]);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod history;
pub mod types;

pub use error::{Result, StoreError};
pub use history::HistoryStore;
pub use types::{HistoryEvent, ReplyHandle};
