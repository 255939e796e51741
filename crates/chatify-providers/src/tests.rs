use std::time::Duration;

use chatify_core::config::{AppConfig, ProxyKind};
use chatify_core::error::ProviderError;
use chatify_core::inference::{ByteStream, ChatRequest, InferenceProxy};
use tokio_stream::StreamExt;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::{create_proxy, GeminiProxy, HttpChatProxy};

fn request(message: &str) -> ChatRequest {
    ChatRequest {
        message: message.into(),
        user_id: "user-1".into(),
        conversation_id: "conv-1".into(),
    }
}

async fn collect(mut stream: ByteStream) -> Result<Vec<u8>, ProviderError> {
    let mut out = Vec::new();
    while let Some(chunk) = stream.next().await {
        out.extend_from_slice(&chunk?);
    }
    Ok(out)
}

fn gemini(server: &MockServer, timeout: Duration) -> GeminiProxy {
    GeminiProxy::new(
        "test-key".into(),
        server.uri(),
        "gemini-test".into(),
        512,
        timeout,
    )
}

#[tokio::test]
async fn test_http_proxy_streams_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_json(serde_json::json!({
            "message": "hi",
            "userId": "user-1",
            "conversationId": "conv-1",
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("Héllo, wörld!".as_bytes().to_vec(), "text/plain; charset=utf-8"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let proxy = HttpChatProxy::new(server.uri(), Duration::from_secs(5));
    let stream = proxy.send(&request("hi")).await.unwrap();
    let body = collect(stream).await.unwrap();
    assert_eq!(String::from_utf8(body).unwrap(), "Héllo, wörld!");
}

#[tokio::test]
async fn test_http_proxy_non_success_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(502).set_body_json(serde_json::json!({"error": "Model error"})))
        .mount(&server)
        .await;

    let proxy = HttpChatProxy::new(format!("{}/", server.uri()), Duration::from_secs(5));
    match proxy.send(&request("hi")).await {
        Err(ProviderError::Api { status, message }) => {
            assert_eq!(status, 502);
            assert_eq!(message, "Model error");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected an API error"),
    }
}

#[tokio::test]
async fn test_http_proxy_first_byte_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let proxy = HttpChatProxy::new(server.uri(), Duration::from_millis(200));
    assert!(matches!(
        proxy.send(&request("hi")).await,
        Err(ProviderError::Timeout(_))
    ));
}

#[tokio::test]
async fn test_http_proxy_times_out_when_body_stalls_after_headers() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nTransfer-Encoding: chunked\r\n\r\n",
            )
            .await
            .unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let proxy = HttpChatProxy::new(format!("http://{addr}"), Duration::from_millis(300));
    let mut stream = proxy
        .send(&request("hi"))
        .await
        .expect("headers arrive before the deadline");

    let first = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("first chunk wait is bounded");
    assert!(matches!(first, Some(Err(ProviderError::Timeout(_)))));
    assert!(stream.next().await.is_none());

    server.abort();
}

#[tokio::test]
async fn test_http_proxy_rejects_blank_message_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let proxy = HttpChatProxy::new(server.uri(), Duration::from_secs(5));
    assert!(matches!(
        proxy.send(&request("  \n")).await,
        Err(ProviderError::InvalidRequest(_))
    ));
}

#[tokio::test]
async fn test_gemini_proxy_buffered_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-test:generateContent"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "Hello, " }, { "text": "world!" }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let proxy = gemini(&server, Duration::from_secs(5));
    let body = collect(proxy.send(&request("hi")).await.unwrap()).await.unwrap();
    assert_eq!(body, b"Hello, world!");
}

#[tokio::test]
async fn test_gemini_proxy_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let proxy = gemini(&server, Duration::from_secs(5));
    match proxy.send(&request("hi")).await {
        Err(ProviderError::Api { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "boom");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected an API error"),
    }
}

#[tokio::test]
async fn test_gemini_proxy_empty_answer_is_empty_stream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"candidates": []})))
        .mount(&server)
        .await;

    let proxy = gemini(&server, Duration::from_secs(5));
    let body = collect(proxy.send(&request("hi")).await.unwrap()).await.unwrap();
    assert!(body.is_empty());
}

#[test]
fn test_create_proxy_selects_kind() {
    let mut config = AppConfig::default();
    assert_eq!(create_proxy(&config).unwrap().name(), "http");

    config.proxy.kind = ProxyKind::Gemini;
    config.proxy.gemini_api_key = None;
    assert!(matches!(
        create_proxy(&config),
        Err(ProviderError::MissingApiKey(_))
    ));

    config.proxy.gemini_api_key = Some("k".into());
    assert_eq!(create_proxy(&config).unwrap().name(), "gemini");
}
