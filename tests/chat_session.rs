use std::net::SocketAddr;
use std::sync::{ Arc, Mutex };
use std::time::Duration;

use arcanea::client::{ ApiClient, ChatSession, ClientError, SessionState, SubmitOutcome };
use arcanea::llm::chat::openai::OpenAIChatClient;
use arcanea::llm::chat::ChatClient;
use arcanea::llm::{ LlmError, ProviderRequest, TokenStream };
use arcanea::models::chat::Role;
use arcanea::relay::{ ChatRelay, RelaySettings };
use arcanea::server::api::router;
use async_trait::async_trait;
use serde_json::{ json, Value };
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use wiremock::matchers::{ method, path };
use wiremock::{ Mock, MockServer, ResponseTemplate };

async fn endpoint_replying(body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/plain; charset=utf-8"))
        .mount(&server).await;
    server
}

/// Provider whose tokens are pushed by the test through a channel.
struct Scripted {
    rx: Mutex<Option<mpsc::Receiver<Result<String, LlmError>>>>,
}

#[async_trait]
impl ChatClient for Scripted {
    async fn stream_chat(&self, _request: &ProviderRequest) -> Result<TokenStream, LlmError> {
        let rx = self.rx.lock().unwrap().take().expect("scripted provider is single use");
        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    fn model(&self) -> &str {
        "scripted"
    }

    fn base_url(&self) -> &str {
        "memory://"
    }
}

async fn serve(relay: Arc<ChatRelay>) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(relay)).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn outline_request_builds_one_growing_reply() {
    let server = endpoint_replying("I. Premise\nII. Rising action").await;
    let api = ApiClient::new(server.uri());
    let mut session = ChatSession::new();
    let mut updates = 0;

    let outcome = session
        .submit(&api, "Help me outline a novel", |message| {
            assert_eq!(message.role, Role::Assistant);
            updates += 1;
        }).await
        .unwrap();

    assert_eq!(outcome, SubmitOutcome::Completed);
    assert!(updates >= 1);
    assert_eq!(session.state(), SessionState::Ready);

    let history = session.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "Help me outline a novel");
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[1].content, "I. Premise\nII. Rising action");

    let requests = server.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent, json!({"messages": [{"role": "user", "content": "Help me outline a novel"}]}));
}

#[tokio::test]
async fn whitespace_never_reaches_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;
    let api = ApiClient::new(server.uri());
    let mut session = ChatSession::new();

    for text in ["", "   ", "\n\t"] {
        let outcome = session.submit(&api, text, |_| {}).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Ignored);
    }

    assert!(session.history().is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn endpoint_error_is_reported_and_session_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(
                json!({"error": "Failed to process chat request", "details": "provider returned HTTP 429: slow down"})
            )
        )
        .mount(&server).await;
    let api = ApiClient::new(server.uri());
    let mut session = ChatSession::new();

    let err = session.submit(&api, "Draft a logline", |_| {}).await.unwrap_err();
    match err {
        ClientError::Endpoint { status, error, details } => {
            assert_eq!(status, 500);
            assert_eq!(error, "Failed to process chat request");
            assert!(details.contains("429"));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.history().len(), 1);

    let retried = session.submit(&api, "Draft a logline", |_| {}).await;
    assert!(retried.is_err());
    assert_eq!(session.history().len(), 2);
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let api = ApiClient::new("http://127.0.0.1:1".to_string());
    let mut session = ChatSession::new();

    let err = session.submit(&api, "hello?", |_| {}).await.unwrap_err();
    assert!(matches!(err, ClientError::Http(_)));
    assert!(!session.is_streaming());
}

#[tokio::test]
async fn client_and_relay_round_trip_through_a_live_server() {
    let provider = MockServer::start().await;
    let sse =
        "data: {\"choices\":[{\"delta\":{\"content\":\"Start with \"}}]}\n\n\
               data: {\"choices\":[{\"delta\":{\"content\":\"a hero.\"}}]}\n\n\
               data: [DONE]\n\n";
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
        .expect(2)
        .mount(&provider).await;

    let client = OpenAIChatClient::new("test-key".into(), None, Some(provider.uri())).unwrap();
    let relay = Arc::new(ChatRelay::new(Arc::new(client), RelaySettings::default()));
    let addr = serve(relay).await;

    let api = ApiClient::new(format!("http://{}", addr));
    let mut session = ChatSession::new();

    session.submit(&api, "Help me outline a novel", |_| {}).await.unwrap();
    assert_eq!(session.history()[1].content, "Start with a hero.");

    session.submit(&api, "Make it darker", |_| {}).await.unwrap();
    assert_eq!(session.history().len(), 4);

    let requests = provider.received_requests().await.unwrap();
    let second: Value = serde_json::from_slice(&requests[1].body).unwrap();
    let roles: Vec<&str> = second["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, ["system", "user", "assistant", "user"]);
    assert_eq!(second["messages"][2]["content"], "Start with a hero.");
}

#[tokio::test]
async fn interrupted_reply_keeps_partial_text_and_returns_to_ready() {
    let (tx, rx) = mpsc::channel(8);
    let provider = Arc::new(Scripted { rx: Mutex::new(Some(rx)) });
    let settings = RelaySettings {
        max_duration: Duration::from_millis(300),
        ..RelaySettings::default()
    };
    let addr = serve(Arc::new(ChatRelay::new(provider, settings))).await;
    tx.send(Ok("Act one".to_string())).await.unwrap();

    let api = ApiClient::new(format!("http://{}", addr));
    let mut session = ChatSession::new();
    let result = timeout(
        Duration::from_secs(5),
        session.submit(&api, "Help me outline a novel", |_| {})
    ).await.expect("relay budget must end the reply");

    assert!(result.is_err());
    assert_eq!(session.state(), SessionState::Ready);
    let history = session.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[1].content, "Act one");
    drop(tx);
}

#[tokio::test]
async fn truncated_code_point_at_end_of_body_is_replaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"ok \xe2\x9c".to_vec(), "text/plain; charset=utf-8"))
        .mount(&server).await;
    let api = ApiClient::new(server.uri());
    let mut session = ChatSession::new();

    session.submit(&api, "Say something", |_| {}).await.unwrap();

    assert_eq!(session.history()[1].content, "ok \u{fffd}");
}
