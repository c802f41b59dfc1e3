//! Core types for the Clarity chat client.
//!
//! This crate provides the foundational types shared by the store and the client:
//!
//! - **Identifiers**: the per-conversation [`SessionId`]
//! - **Messages**: [`Role`] and [`Message`], the unit of conversation history
//! - **Error types**: common error definitions shared across crates
//!
//! # Example
//!
//! ```
//! use clarity_core::{Message, Role, SessionId};
//!
//! // One identity per conversation
//! let session_id = SessionId::generate();
//! assert_ne!(session_id, SessionId::generate());
//!
//! let greeting = Message::assistant("Hi there");
//! assert_eq!(greeting.role, Role::Assistant);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod message;

pub use error::{CoreError, Result};
pub use ids::{IdError, SessionId};
pub use message::{Message, Role};
