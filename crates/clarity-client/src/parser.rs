//! Stream event parsing.
//!
//! Streamed replies are text lines. Lines of interest start with `data:` and
//! carry either a raw token or a JSON-encoded string token. A payload that
//! trims to `[DONE]` ends the stream.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Prefix of lines that carry a payload.
pub const EVENT_PREFIX: &str = "data:";

/// Payload that marks the end of a reply.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Encoding of `data:` payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    /// The payload is the token text itself.
    #[default]
    Raw,
    /// The payload is a JSON string literal holding the token text.
    Json,
}

impl FromStr for PayloadFormat {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" | "text" => Ok(Self::Raw),
            "json" => Ok(Self::Json),
            other => Err(ClientError::InvalidConfig(format!(
                "unknown payload format '{other}'"
            ))),
        }
    }
}

/// A typed event decoded from one stream line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A fragment of reply text, verbatim.
    Token(String),
    /// The reply is complete; stop reading.
    Done,
    /// A `data:` line whose payload could not be decoded.
    Malformed,
}

/// Classifies decoded lines as [`StreamEvent`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventParser {
    format: PayloadFormat,
}

impl EventParser {
    /// Create a parser for the given payload format.
    #[must_use]
    pub const fn new(format: PayloadFormat) -> Self {
        Self { format }
    }

    /// The payload format this parser expects.
    #[must_use]
    pub const fn format(&self) -> PayloadFormat {
        self.format
    }

    /// Parse one line.
    ///
    /// Returns `None` for lines without the `data:` prefix. Token text is never
    /// trimmed; only the sentinel comparison ignores surrounding whitespace.
    #[must_use]
    pub fn parse(&self, line: &str) -> Option<StreamEvent> {
        let payload = extract_payload(line)?;

        if is_sentinel(payload) {
            return Some(StreamEvent::Done);
        }

        let event = match self.format {
            PayloadFormat::Raw => StreamEvent::Token(payload.to_string()),
            PayloadFormat::Json => match serde_json::from_str::<String>(payload) {
                Ok(token) if is_sentinel(&token) => StreamEvent::Done,
                Ok(token) => StreamEvent::Token(token),
                Err(e) => {
                    tracing::trace!(error = %e, line = %line, "Dropping malformed stream line");
                    StreamEvent::Malformed
                }
            },
        };
        Some(event)
    }
}

/// Strip the event prefix and at most one following space.
fn extract_payload(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(EVENT_PREFIX)?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

fn is_sentinel(payload: &str) -> bool {
    payload.trim() == DONE_SENTINEL
}
