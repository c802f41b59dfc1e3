//! Streaming chat session engine for the Clarity chat client.
//!
//! A [`ChatSession`] sends the user's messages to a chat backend and writes
//! the replies into a [`HistoryStore`](clarity_store::HistoryStore) token by
//! token as they stream in.
//!
//! # Pipeline
//!
//! ```text
//! bytes ──▶ FrameDecoder ──▶ lines ──▶ EventParser ──▶ StreamEvent ──▶ HistoryStore
//!          (UTF-8, '\n')              (data:, [DONE])   Token / Done
//! ```
//!
//! The network sits behind the [`ChatTransport`] trait; [`HttpTransport`] is
//! the `reqwest` implementation.
//!
//! # Example
//!
//! ```no_run
//! use clarity_client::{ChatSession, ClientConfig, SendOutcome};
//!
//! # async fn example() -> clarity_client::Result<()> {
//! let config = ClientConfig::with_base_url("http://localhost:8000");
//! let session = ChatSession::from_config(&config)?;
//!
//! if session.send("What is 2+2?").await == SendOutcome::Completed {
//!     println!("{:?}", session.history().last());
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod decoder;
pub mod error;
mod lifecycle;
pub mod parser;
pub mod session;
pub mod transport;
pub mod types;

pub use config::{ClientConfig, TransportMode, DEFAULT_GREETING};
pub use decoder::FrameDecoder;
pub use error::{ClientError, Result};
pub use parser::{EventParser, PayloadFormat, StreamEvent, DONE_SENTINEL, EVENT_PREFIX};
pub use session::{error_marker, ChatSession, SendOutcome, SessionState, NO_REPLY_PLACEHOLDER};
pub use transport::{ByteStream, ChatTransport, HttpTransport};
pub use types::{ApiErrorResponse, ChatReply, ChatRequest, HealthResponse, ResetRequest};
