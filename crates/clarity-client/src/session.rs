//! Chat session with streaming support.
//!
//! A [`ChatSession`] drives one conversation: it records the user's message,
//! requests a reply, feeds the response body through the
//! [`FrameDecoder`] and [`EventParser`], and writes tokens into the session's
//! [`HistoryStore`] as they arrive.
//!
//! At most one send is in flight per session. Every send ends with the session
//! idle again, whether the reply completed, failed, was cancelled or was
//! superseded by a reset.
//!
//! # State Machine
//!
//! ```text
//!            send (non-blank)
//!   ┌──────┐ ───────────────▶ ┌─────────┐
//!   │ Idle │                  │ Sending │──┐ send: Ignored
//!   └──────┘ ◀─────────────── └─────────┘◀─┘
//!       Done, end of body, failure,
//!       cancel, reset
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clarity_core::{Message, SessionId};
use clarity_store::{HistoryEvent, HistoryStore, ReplyHandle};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::{ClientConfig, TransportMode};
use crate::decoder::FrameDecoder;
use crate::error::{ClientError, Result};
use crate::parser::{EventParser, StreamEvent};
use crate::transport::{ByteStream, ChatTransport, HttpTransport};
use crate::types::ChatRequest;

/// Reply text used when a single-shot response carries no `reply` field.
pub const NO_REPLY_PLACEHOLDER: &str = "(no reply)";

/// Build the inline assistant message reporting a failed send.
#[must_use]
pub fn error_marker(description: &str) -> String {
    format!("⚠️ Error: {description}")
}

/// Whether a send is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Ready to send.
    Idle,
    /// A reply is being requested or streamed.
    Sending,
}

/// How a call to [`ChatSession::send`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank text, or another send was in flight. Nothing changed.
    Ignored,
    /// The reply arrived in full.
    Completed,
    /// The stream closed before the sentinel. Tokens received are kept.
    EndedWithoutDone,
    /// [`ChatSession::cancel`] stopped the reply. Tokens received are kept.
    Cancelled,
    /// The history was reset underneath the send; its late output was dropped.
    Superseded,
    /// The send failed; an error marker was appended to the history.
    Failed(String),
}

/// Bookkeeping for the send in flight.
struct Flight {
    id: u64,
    cancel: CancellationToken,
    awaiting_first_token: bool,
}

/// Returns the session to idle when the send ends, including when the send
/// future is dropped mid-flight. A reset may already have released the slot
/// to a newer send; that flight is left alone.
struct FlightGuard<'a> {
    slot: &'a Mutex<Option<Flight>>,
    id: u64,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|flight| flight.id == self.id) {
            *slot = None;
        }
    }
}

/// Outcome of feeding one line to the session.
enum Step {
    Continue,
    Finish(SendOutcome),
}

/// One conversation with the chat backend.
pub struct ChatSession {
    pub(crate) session_id: SessionId,
    pub(crate) store: Arc<HistoryStore>,
    pub(crate) transport: Option<Arc<dyn ChatTransport>>,
    pub(crate) greeting: String,
    mode: TransportMode,
    parser: EventParser,
    read_timeout: Duration,
    flight: Mutex<Option<Flight>>,
    next_flight: AtomicU64,
}

impl ChatSession {
    /// Create a session talking HTTP to the backend named in `config`.
    ///
    /// A missing base URL is not an error here: the session is created and
    /// every send reports the missing address inline.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let transport: Option<Arc<dyn ChatTransport>> = match HttpTransport::from_config(config) {
            Ok(transport) => Some(Arc::new(transport)),
            Err(ClientError::NotConfigured) => {
                tracing::warn!("No backend URL configured; sends will fail");
                None
            }
            Err(e) => return Err(e),
        };
        Ok(Self::with_transport(config, transport))
    }

    /// Create a session over an explicit transport.
    ///
    /// The history starts with the configured greeting and a fresh identity is
    /// generated.
    #[must_use]
    pub fn with_transport(
        config: &ClientConfig,
        transport: Option<Arc<dyn ChatTransport>>,
    ) -> Self {
        let session_id = SessionId::generate();
        tracing::debug!(session_id = %session_id, mode = ?config.mode, "Session created");
        Self {
            session_id,
            store: Arc::new(HistoryStore::with_messages(vec![Message::assistant(
                config.greeting.clone(),
            )])),
            transport,
            greeting: config.greeting.clone(),
            mode: config.mode,
            parser: EventParser::new(config.payload_format),
            read_timeout: config.read_timeout(),
            flight: Mutex::new(None),
            next_flight: AtomicU64::new(0),
        }
    }

    // =========================================================================
    // State
    // =========================================================================

    /// The identity sent with every request.
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// The history this session writes to.
    #[must_use]
    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.store
    }

    /// Copy of the current history.
    #[must_use]
    pub fn history(&self) -> Vec<Message> {
        self.store.snapshot()
    }

    /// Subscribe to history changes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.store.subscribe()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.flight.lock().is_some() {
            SessionState::Sending
        } else {
            SessionState::Idle
        }
    }

    /// Whether a send is in flight.
    #[must_use]
    pub fn is_sending(&self) -> bool {
        self.state() == SessionState::Sending
    }

    /// Whether a send is in flight and no reply text has arrived yet.
    #[must_use]
    pub fn is_awaiting_first_token(&self) -> bool {
        self.flight
            .lock()
            .as_ref()
            .is_some_and(|flight| flight.awaiting_first_token)
    }

    fn mark_first_token(&self, id: u64) {
        if let Some(flight) = self.flight.lock().as_mut().filter(|flight| flight.id == id) {
            flight.awaiting_first_token = false;
        }
    }

    // =========================================================================
    // Send
    // =========================================================================

    /// Send `text` and record the reply in the history.
    ///
    /// Blank text, or a call made while another send is in flight, is ignored.
    /// Failures never escape: they are appended to the history as an assistant
    /// message and reported through the returned [`SendOutcome`].
    pub async fn send(&self, text: &str) -> SendOutcome {
        if text.trim().is_empty() {
            return SendOutcome::Ignored;
        }

        let cancel = CancellationToken::new();
        let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
        {
            let mut flight = self.flight.lock();
            if flight.is_some() {
                tracing::debug!(session_id = %self.session_id, "Send ignored; a reply is in flight");
                return SendOutcome::Ignored;
            }
            *flight = Some(Flight {
                id,
                cancel: cancel.clone(),
                awaiting_first_token: true,
            });
        }
        let _guard = FlightGuard {
            slot: &self.flight,
            id,
        };

        let generation = self.store.generation();
        if self
            .store
            .append_if_current(generation, Message::user(text))
            .is_err()
        {
            return SendOutcome::Superseded;
        }

        let Some(transport) = self.transport.clone() else {
            return self.fail(generation, &ClientError::NotConfigured);
        };

        let request = ChatRequest {
            message: text.to_string(),
            session_id: self.session_id,
        };

        tracing::debug!(session_id = %self.session_id, mode = ?self.mode, "Sending message");

        // Dropping the exchange on cancellation closes the response body.
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Ok(SendOutcome::Cancelled),
            result = self.exchange(transport.as_ref(), &request, generation, id) => result,
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(_) if cancel.is_cancelled() => SendOutcome::Cancelled,
            Err(e) => self.fail(generation, &e),
        };

        tracing::debug!(session_id = %self.session_id, outcome = ?outcome, "Send finished");
        outcome
    }

    /// Stop the send in flight.
    ///
    /// Tokens already received stay in the history. Returns `true` if a send
    /// was in flight.
    pub fn cancel(&self) -> bool {
        match self.flight.lock().as_ref() {
            Some(flight) => {
                flight.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel the send in flight and release the session at once.
    ///
    /// The cancelled send still returns, but it no longer holds the session,
    /// so a new send may start before it does.
    pub(crate) fn abandon_flight(&self) -> bool {
        match self.flight.lock().take() {
            Some(flight) => {
                flight.cancel.cancel();
                true
            }
            None => false,
        }
    }

    async fn exchange(
        &self,
        transport: &dyn ChatTransport,
        request: &ChatRequest,
        generation: u64,
        flight_id: u64,
    ) -> Result<SendOutcome> {
        match self.mode {
            TransportMode::Stream => {
                // The backend may hold the response headers; bound that wait too.
                let body =
                    tokio::time::timeout(self.read_timeout, transport.send_streaming(request))
                        .await
                        .map_err(|_| ClientError::Timeout(self.read_timeout))??;
                self.read_stream(body, generation, flight_id).await
            }
            TransportMode::Single => {
                let reply = transport.send_single(request).await?;
                let content = reply
                    .reply
                    .unwrap_or_else(|| NO_REPLY_PLACEHOLDER.to_string());
                Ok(
                    match self
                        .store
                        .append_if_current(generation, Message::assistant(content))
                    {
                        Ok(_) => SendOutcome::Completed,
                        Err(_) => SendOutcome::Superseded,
                    },
                )
            }
        }
    }

    /// Read the response body until the sentinel, end of body, or an error.
    async fn read_stream(
        &self,
        mut body: ByteStream,
        generation: u64,
        flight_id: u64,
    ) -> Result<SendOutcome> {
        let Ok(reply) = self.store.start_reply_if_current(generation) else {
            return Ok(SendOutcome::Superseded);
        };
        let mut decoder = FrameDecoder::new();

        loop {
            let next = tokio::time::timeout(self.read_timeout, body.next())
                .await
                .map_err(|_| ClientError::Timeout(self.read_timeout))?;

            let Some(chunk) = next else {
                break;
            };

            for line in decoder.decode(&chunk?) {
                if let Step::Finish(outcome) = self.apply_line(&line, &reply, flight_id) {
                    return Ok(outcome);
                }
            }
        }

        if let Some(line) = decoder.finish() {
            if let Step::Finish(outcome) = self.apply_line(&line, &reply, flight_id) {
                return Ok(outcome);
            }
        }

        tracing::debug!(session_id = %self.session_id, "Stream closed without sentinel");
        Ok(SendOutcome::EndedWithoutDone)
    }

    fn apply_line(&self, line: &str, reply: &ReplyHandle, flight_id: u64) -> Step {
        match self.parser.parse(line) {
            None | Some(StreamEvent::Malformed) => Step::Continue,
            Some(StreamEvent::Done) => Step::Finish(SendOutcome::Completed),
            Some(StreamEvent::Token(token)) => {
                if let Err(e) = self.store.append_to_reply(reply, &token) {
                    tracing::debug!(
                        session_id = %self.session_id,
                        error = %e,
                        "Discarding tokens for superseded reply"
                    );
                    return Step::Finish(SendOutcome::Superseded);
                }
                if !token.is_empty() {
                    self.mark_first_token(flight_id);
                }
                Step::Continue
            }
        }
    }

    /// Append an error marker unless the history has moved on.
    fn fail(&self, generation: u64, error: &ClientError) -> SendOutcome {
        let description = error.to_string();
        tracing::warn!(session_id = %self.session_id, error = %description, "Send failed");

        match self
            .store
            .append_if_current(generation, Message::assistant(error_marker(&description)))
        {
            Ok(_) => SendOutcome::Failed(description),
            Err(_) => SendOutcome::Superseded,
        }
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("session_id", &self.session_id)
            .field("mode", &self.mode)
            .field("state", &self.state())
            .field("configured", &self.transport.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_marker_includes_description() {
        assert_eq!(
            error_marker("API error (500): boom"),
            "⚠️ Error: API error (500): boom"
        );
    }

    #[test]
    fn new_session_starts_idle_with_greeting() {
        let config = ClientConfig {
            greeting: "Hi".to_string(),
            ..ClientConfig::default()
        };
        let session = ChatSession::with_transport(&config, None);

        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.is_awaiting_first_token());
        assert_eq!(session.history(), vec![Message::assistant("Hi")]);
        assert!(!session.cancel());
    }

    #[test]
    fn sessions_get_distinct_identities() {
        let config = ClientConfig::default();
        let a = ChatSession::with_transport(&config, None);
        let b = ChatSession::with_transport(&config, None);
        assert_ne!(a.session_id(), b.session_id());
    }

    #[tokio::test]
    async fn blank_text_is_ignored() {
        let session = ChatSession::with_transport(&ClientConfig::default(), None);
        assert_eq!(session.send("   \n\t").await, SendOutcome::Ignored);
        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn missing_configuration_is_reported_inline() {
        let session = ChatSession::from_config(&ClientConfig::default()).unwrap();

        let outcome = session.send("hello").await;

        assert_eq!(
            outcome,
            SendOutcome::Failed("backend URL is not configured".to_string())
        );
        let history = session.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1], Message::user("hello"));
        assert_eq!(
            history[2],
            Message::assistant("⚠️ Error: backend URL is not configured")
        );
        assert_eq!(session.state(), SessionState::Idle);
    }
}
