//! Error types for the chat client.

use std::time::Duration;

use thiserror::Error;

/// A result type using `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur while talking to the chat backend.
///
/// None of these are fatal to a session: the session reports them inline as an
/// assistant message and returns to idle.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend returned a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description taken from the response.
        message: String,
    },

    /// Failed to parse a response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Backend answered without a response body.
    #[error("Response has no body")]
    MissingBody,

    /// No chunk arrived within the read timeout.
    #[error("Timed out after {0:?} waiting for the stream")]
    Timeout(Duration),

    /// No backend address is configured.
    #[error("backend URL is not configured")]
    NotConfigured,

    /// A configuration value could not be understood.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    /// HTTP status code associated with the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display() {
        let err = ClientError::Api {
            status: 500,
            message: "Internal Server Error".to_string(),
        };
        assert_eq!(err.to_string(), "API error (500): Internal Server Error");
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn timeout_display_names_duration() {
        let err = ClientError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "Timed out after 30s waiting for the stream");
        assert_eq!(err.status(), None);
    }
}
