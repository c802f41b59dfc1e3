//! Session lifecycle: clearing the conversation.

use clarity_core::Message;

use crate::session::ChatSession;
use crate::types::ResetRequest;

impl ChatSession {
    /// Clear the conversation.
    ///
    /// Cancels any send in flight and releases the session, then replaces the
    /// history with the greeting alone. A new send may start as soon as this
    /// returns. Tokens that arrive for the cancelled reply afterwards are
    /// discarded. The backend is told to forget the session in the background;
    /// the outcome of that request is ignored.
    pub fn reset(&self) {
        let cancelled = self.abandon_flight();
        let generation = self
            .store
            .replace_all(vec![Message::assistant(self.greeting.clone())]);

        tracing::info!(
            session_id = %self.session_id,
            generation,
            cancelled,
            "Conversation reset"
        );

        self.notify_reset();
    }

    /// Fire-and-forget `POST /reset`.
    ///
    /// Skipped when no transport is configured or no Tokio runtime is running.
    fn notify_reset(&self) {
        let Some(transport) = self.transport.clone() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(session_id = %self.session_id, "No runtime; skipping backend reset");
            return;
        };

        let request = ResetRequest {
            session_id: self.session_id,
        };
        handle.spawn(async move {
            if let Err(e) = transport.reset(&request).await {
                tracing::debug!(
                    session_id = %request.session_id,
                    error = %e,
                    "Backend reset failed"
                );
            }
        });
    }
}
