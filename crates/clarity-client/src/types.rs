//! Wire types for the chat backend.
//!
//! These types mirror the request and response bodies of the backend's
//! `/chat`, `/chat/stream`, `/reset` and `/health` routes.

use clarity_core::SessionId;
use serde::{Deserialize, Serialize};

// =============================================================================
// Chat
// =============================================================================

/// Body of `POST /chat` and `POST /chat/stream`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's message, exactly as typed.
    pub message: String,
    /// Identity of the conversation.
    pub session_id: SessionId,
}

/// Body returned by `POST /chat`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    /// The assistant's reply, if the backend produced one.
    #[serde(default)]
    pub reply: Option<String>,
}

// =============================================================================
// Session
// =============================================================================

/// Body of `POST /reset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetRequest {
    /// Identity of the conversation to clear.
    pub session_id: SessionId,
}

/// Body returned by `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Liveness status, `"ok"` when healthy.
    pub status: String,
    /// Model the backend is configured with.
    #[serde(default)]
    pub model: Option<String>,
}

impl HealthResponse {
    /// Whether the backend reports itself healthy.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

// =============================================================================
// Error Response
// =============================================================================

/// Error body returned by the backend.
///
/// Validation failures carry a `detail` field; other errors may carry `error`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorResponse {
    /// Error message.
    #[serde(default)]
    pub error: Option<String>,
    /// Error detail, a string or a structured list of problems.
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ApiErrorResponse {
    /// The most descriptive message the body carries.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        if let Some(error) = &self.error {
            return Some(error.clone());
        }
        match &self.detail {
            Some(serde_json::Value::String(detail)) => Some(detail.clone()),
            Some(detail) => Some(detail.to_string()),
            None => None,
        }
    }
}
