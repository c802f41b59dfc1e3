//! HTTP transport for the chat backend.
//!
//! This module provides the [`ChatTransport`] seam used by the session and its
//! `reqwest` implementation, [`HttpTransport`].

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::types::{ApiErrorResponse, ChatReply, ChatRequest, HealthResponse, ResetRequest};

/// Raw response body chunks in arrival order.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

/// Trait for backend communication.
///
/// This trait abstracts the network, allowing scripted implementations in tests.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a message to `POST /chat/stream` and return the live response body.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the status is not a success, or
    /// the response has no body.
    async fn send_streaming(&self, request: &ChatRequest) -> Result<ByteStream>;

    /// Send a message to `POST /chat` and return the parsed reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the status is not a success, or
    /// the body is not a reply object.
    async fn send_single(&self, request: &ChatRequest) -> Result<ChatReply>;

    /// Ask the backend to forget a session's history via `POST /reset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the status is not a success.
    async fn reset(&self, request: &ResetRequest) -> Result<()>;

    /// Query `GET /health`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body cannot be parsed.
    async fn health(&self) -> Result<HealthResponse>;
}

/// `reqwest` implementation of [`ChatTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    request_timeout: Duration,
}

impl HttpTransport {
    /// Create a transport for the backend at `base_url`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the backend (e.g., "http://localhost:8000")
    /// * `connect_timeout` - TCP connect timeout
    /// * `request_timeout` - Total timeout for requests that are not streamed
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self::with_client(client, base_url, request_timeout))
    }

    /// Create a transport with a custom reqwest client.
    #[must_use]
    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout,
        }
    }

    /// Create a transport from a client configuration.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotConfigured` if no base URL is set, or an error
    /// if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(ClientError::NotConfigured)?;
        Self::new(base_url, config.connect_timeout(), config.read_timeout())
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Build headers for JSON requests.
    fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    /// Handle error responses.
    async fn handle_error(response: reqwest::Response) -> ClientError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorResponse>(&body)
            .ok()
            .and_then(|err| err.message())
            .or_else(|| Some(body.trim().to_string()).filter(|text| !text.is_empty()))
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| "Unknown error".to_string());
        ClientError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send_streaming(&self, request: &ChatRequest) -> Result<ByteStream> {
        let url = self.url("/chat/stream");

        let response = self
            .client
            .post(&url)
            .headers(Self::json_headers())
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }
        if response.content_length() == Some(0) {
            return Err(ClientError::MissingBody);
        }

        tracing::debug!(
            session_id = %request.session_id,
            status = response.status().as_u16(),
            "Reply stream opened"
        );

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ClientError::from))
            .boxed())
    }

    async fn send_single(&self, request: &ChatRequest) -> Result<ChatReply> {
        let url = self.url("/chat");

        let response = self
            .client
            .post(&url)
            .headers(Self::json_headers())
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        let reply: ChatReply = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;

        Ok(reply)
    }

    async fn reset(&self, request: &ResetRequest) -> Result<()> {
        let url = self.url("/reset");

        let response = self
            .client
            .post(&url)
            .headers(Self::json_headers())
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        Ok(())
    }

    async fn health(&self) -> Result<HealthResponse> {
        let url = self.url("/health");

        let response = self
            .client
            .get(&url)
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        let health: HealthResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;

        Ok(health)
    }
}

/// Scripted in-memory transport for tests and offline use.
pub mod mock {
    use std::collections::VecDeque;

    use futures::channel::mpsc;
    use futures::stream;
    use parking_lot::Mutex;

    use super::{async_trait, ByteStream, ChatTransport, StreamExt};
    use crate::error::{ClientError, Result};
    use crate::types::{ChatReply, ChatRequest, HealthResponse, ResetRequest};

    /// One scripted answer, consumed by the next chat request.
    pub enum Reply {
        /// Body returned by `send_streaming`.
        Stream(ByteStream),
        /// Reply returned by `send_single`.
        Single(ChatReply),
        /// Error returned by either send method.
        Error(ClientError),
        /// A backend that accepts the request and never answers.
        Stalled,
    }

    impl Reply {
        /// A streamed body delivering `chunks` in order, then closing.
        #[must_use]
        pub fn chunks<I, C>(chunks: I) -> Self
        where
            I: IntoIterator<Item = C>,
            C: AsRef<[u8]>,
        {
            let chunks: Vec<Result<Vec<u8>>> = chunks
                .into_iter()
                .map(|chunk| Ok(chunk.as_ref().to_vec()))
                .collect();
            Self::Stream(stream::iter(chunks).boxed())
        }

        /// A streamed body fed by the returned sender.
        ///
        /// The body stays open until the sender is dropped.
        #[must_use]
        pub fn channel() -> (mpsc::UnboundedSender<Result<Vec<u8>>>, Self) {
            let (tx, rx) = mpsc::unbounded();
            (tx, Self::Stream(rx.boxed()))
        }

        /// A single-shot reply carrying `text`.
        #[must_use]
        pub fn text(text: impl Into<String>) -> Self {
            Self::Single(ChatReply {
                reply: Some(text.into()),
            })
        }
    }

    /// A transport that answers from a queue of [`Reply`] values and records
    /// every request it receives.
    #[derive(Default)]
    pub struct MockTransport {
        replies: Mutex<VecDeque<Reply>>,
        requests: Mutex<Vec<ChatRequest>>,
        resets: Mutex<Vec<ResetRequest>>,
    }

    impl MockTransport {
        /// Create a transport with no scripted replies.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue the answer for the next chat request.
        pub fn push(&self, reply: Reply) {
            self.replies.lock().push_back(reply);
        }

        /// Chat requests received so far.
        #[must_use]
        pub fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().clone()
        }

        /// Reset requests received so far.
        #[must_use]
        pub fn resets(&self) -> Vec<ResetRequest> {
            self.resets.lock().clone()
        }

        fn next(&self, request: &ChatRequest) -> Result<Reply> {
            self.requests.lock().push(request.clone());
            match self.replies.lock().pop_front() {
                Some(Reply::Error(e)) => Err(e),
                Some(reply) => Ok(reply),
                None => Err(ClientError::Api {
                    status: 503,
                    message: "no scripted reply".to_string(),
                }),
            }
        }
    }

    #[async_trait]
    impl ChatTransport for MockTransport {
        async fn send_streaming(&self, request: &ChatRequest) -> Result<ByteStream> {
            match self.next(request)? {
                Reply::Stream(body) => Ok(body),
                Reply::Stalled => std::future::pending().await,
                _ => Err(ClientError::Parse("scripted reply is not a stream".to_string())),
            }
        }

        async fn send_single(&self, request: &ChatRequest) -> Result<ChatReply> {
            match self.next(request)? {
                Reply::Single(reply) => Ok(reply),
                Reply::Stalled => std::future::pending().await,
                _ => Err(ClientError::Parse("scripted reply is not a single reply".to_string())),
            }
        }

        async fn reset(&self, request: &ResetRequest) -> Result<()> {
            self.resets.lock().push(request.clone());
            Ok(())
        }

        async fn health(&self) -> Result<HealthResponse> {
            Ok(HealthResponse {
                status: "ok".to_string(),
                model: None,
            })
        }
    }
}
