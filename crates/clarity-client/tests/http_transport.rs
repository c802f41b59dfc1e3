//! HTTP transport tests against a local mock backend.

use std::time::Duration;

use clarity_client::{
    ChatRequest, ChatSession, ChatTransport, ClientConfig, ClientError, HttpTransport,
    SendOutcome, TransportMode,
};
use clarity_core::{Message, SessionId};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_raw(body.to_string(), "text/event-stream")
}

fn single_config(server: &MockServer) -> ClientConfig {
    ClientConfig {
        mode: TransportMode::Single,
        ..ClientConfig::with_base_url(server.uri())
    }
}

async fn request_bodies(server: &MockServer, route: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == route)
        .map(|request| serde_json::from_slice(&request.body).unwrap())
        .collect()
}

#[tokio::test]
async fn streaming_send_posts_message_and_reads_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/stream"))
        .and(header("accept", "text/event-stream"))
        .respond_with(sse("data: Hello\ndata:  world\n\ndata: [DONE]\n"))
        .expect(1)
        .mount(&server)
        .await;

    let session = ChatSession::from_config(&ClientConfig::with_base_url(server.uri())).unwrap();
    let outcome = session.send("  greet me ").await;

    assert_eq!(outcome, SendOutcome::Completed);
    assert_eq!(session.history()[1], Message::user("  greet me "));
    assert_eq!(session.history()[2], Message::assistant("Hello world"));

    let bodies = request_bodies(&server, "/chat/stream").await;
    assert_eq!(
        bodies,
        vec![json!({
            "message": "  greet me ",
            "session_id": session.session_id().to_string(),
        })]
    );
}

#[tokio::test]
async fn streaming_error_status_is_reported_inline() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/stream"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let session = ChatSession::from_config(&ClientConfig::with_base_url(server.uri())).unwrap();
    let outcome = session.send("q").await;

    assert_eq!(
        outcome,
        SendOutcome::Failed("API error (503): overloaded".to_string())
    );
    assert_eq!(
        session.history().last().unwrap().content,
        "⚠️ Error: API error (503): overloaded"
    );
}

#[tokio::test]
async fn single_send_records_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reply": "4"})))
        .expect(1)
        .mount(&server)
        .await;

    let session = ChatSession::from_config(&single_config(&server)).unwrap();

    assert_eq!(session.send("What is 2+2?").await, SendOutcome::Completed);
    assert_eq!(session.history().last(), Some(&Message::assistant("4")));

    let bodies = request_bodies(&server, "/chat").await;
    assert_eq!(bodies[0]["message"], "What is 2+2?");
    assert_eq!(bodies[0]["session_id"], session.session_id().to_string());
}

#[tokio::test]
async fn single_send_without_reply_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let session = ChatSession::from_config(&single_config(&server)).unwrap();

    assert_eq!(session.send("q").await, SendOutcome::Completed);
    assert_eq!(session.history().last().unwrap().content, "(no reply)");
}

#[tokio::test]
async fn single_send_server_error_uses_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"detail": "model unavailable"})),
        )
        .mount(&server)
        .await;

    let session = ChatSession::from_config(&single_config(&server)).unwrap();
    let outcome = session.send("q").await;

    assert_eq!(
        outcome,
        SendOutcome::Failed("API error (500): model unavailable".to_string())
    );
    assert_eq!(session.history().len(), 3);
    assert!(!session.is_sending());
}

#[tokio::test]
async fn streaming_headers_that_never_arrive_time_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/stream"))
        .respond_with(sse("data: late\ndata: [DONE]\n").set_delay(Duration::from_secs(8)))
        .mount(&server)
        .await;

    let config = ClientConfig {
        read_timeout_seconds: 1,
        ..ClientConfig::with_base_url(server.uri())
    };
    let session = ChatSession::from_config(&config).unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(4), session.send("hi"))
        .await
        .expect("send outlived its read timeout");

    assert!(
        matches!(outcome, SendOutcome::Failed(ref d) if d.starts_with("Timed out")),
        "{outcome:?}"
    );
    assert!(session
        .history()
        .last()
        .unwrap()
        .content
        .starts_with("⚠️ Error: Timed out"));
    assert!(!session.is_sending());
}

#[tokio::test]
async fn unreachable_backend_is_reported_inline() {
    let config = ClientConfig {
        connect_timeout_seconds: 1,
        ..ClientConfig::with_base_url("http://127.0.0.1:1")
    };
    let session = ChatSession::from_config(&config).unwrap();

    let outcome = session.send("hello?").await;

    assert!(
        matches!(outcome, SendOutcome::Failed(ref d) if d.starts_with("HTTP error")),
        "{outcome:?}"
    );
    assert!(session
        .history()
        .last()
        .unwrap()
        .content
        .starts_with("⚠️ Error: HTTP error"));
}

#[tokio::test]
async fn reset_notifies_backend_in_background() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/reset"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let session = ChatSession::from_config(&ClientConfig::with_base_url(server.uri())).unwrap();
    session.store().append(Message::user("forget me"));

    session.reset();
    assert_eq!(session.history().len(), 1);

    let bodies = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let bodies = request_bodies(&server, "/reset").await;
            if !bodies.is_empty() {
                return bodies;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(
        bodies,
        vec![json!({"session_id": session.session_id().to_string()})]
    );
}

#[tokio::test]
async fn reset_failure_is_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/reset"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = ClientConfig {
        greeting: "fresh start".to_string(),
        ..ClientConfig::with_base_url(server.uri())
    };
    let session = ChatSession::from_config(&config).unwrap();
    session.reset();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(session.history(), vec![Message::assistant("fresh start")]);
}

#[tokio::test]
async fn transport_reset_reports_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/reset"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "unknown session"})))
        .mount(&server)
        .await;

    let transport =
        HttpTransport::new(server.uri(), Duration::from_secs(1), Duration::from_secs(5)).unwrap();
    let err = transport
        .reset(&clarity_client::ResetRequest {
            session_id: SessionId::generate(),
        })
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert!(matches!(err, ClientError::Api { ref message, .. } if message == "unknown session"));
}

#[tokio::test]
async fn health_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "model": "gpt-4o-mini"})),
        )
        .mount(&server)
        .await;

    let transport =
        HttpTransport::new(server.uri(), Duration::from_secs(1), Duration::from_secs(5)).unwrap();
    let health = transport.health().await.unwrap();

    assert!(health.is_ok());
    assert_eq!(health.model.as_deref(), Some("gpt-4o-mini"));
}

#[tokio::test]
async fn single_reply_that_is_not_json_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let transport =
        HttpTransport::new(server.uri(), Duration::from_secs(1), Duration::from_secs(5)).unwrap();
    let err = transport
        .send_single(&ChatRequest {
            message: "q".to_string(),
            session_id: SessionId::generate(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Parse(_)));
}
