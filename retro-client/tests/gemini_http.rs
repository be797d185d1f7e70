//! GeminiClient against a one-shot local HTTP responder.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use retro_client::{
    ApiKey, ClientError, GeminiClient, GeminiConfig, RestorationClient, StaticCredentials,
};
use retro_core::{ImagePayload, MediaType};

/// Accept one connection, capture the raw request, answer with `status` + `body`.
async fn serve_once(status: u16, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let request = read_request(&mut socket).await;
        let response = format!(
            "HTTP/1.1 {status} Test\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.expect("write");
        let _ = socket.shutdown().await;
        request
    });
    (format!("http://{addr}/v1beta"), handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = socket.read(&mut chunk).await.expect("read");
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..pos]).to_ascii_lowercase();
            let len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= pos + 4 + len {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn client(endpoint: String) -> GeminiClient {
    let config = GeminiConfig {
        endpoint,
        model: "test-model".to_string(),
        timeout_secs: 5,
        ..GeminiConfig::default()
    };
    let creds = StaticCredentials::new(ApiKey::new("test-key").expect("key"));
    GeminiClient::new(config, Arc::new(creds)).expect("client")
}

fn photo() -> ImagePayload {
    ImagePayload::new(b"old photo".to_vec(), MediaType::from("image/jpeg"))
}

#[tokio::test]
async fn success_returns_inline_image() {
    let (endpoint, server) = serve_once(
        200,
        r#"{"candidates":[{"content":{"parts":[{"inlineData":{"mimeType":"image/png","data":"cmVzdG9yZWQ="}}]}}]}"#,
    )
    .await;

    let restored = client(endpoint).restore(&photo()).await.expect("restore");
    assert_eq!(restored.bytes(), b"restored");
    assert_eq!(restored.media_type(), &MediaType::png());

    let request = server.await.expect("server");
    assert!(request.starts_with("POST /v1beta/models/test-model:generateContent"));
    assert!(request.to_ascii_lowercase().contains("x-goog-api-key: test-key"));
    assert!(request.contains(r#""imageSize":"2K""#));
    assert!(request.contains(r#""mimeType":"image/jpeg""#));
}

#[tokio::test]
async fn quota_error_message_is_verbatim() {
    let (endpoint, server) = serve_once(
        429,
        r#"{"error":{"code":429,"message":"quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#,
    )
    .await;

    let err = client(endpoint).restore(&photo()).await.unwrap_err();
    assert!(matches!(&err, ClientError::Upstream(msg) if msg == "quota exceeded"), "got: {err}");
    assert_eq!(err.to_string(), "quota exceeded");
    server.await.expect("server");
}

#[tokio::test]
async fn empty_candidates_is_empty_response() {
    let (endpoint, server) = serve_once(200, r#"{"candidates":[]}"#).await;
    let err = client(endpoint).restore(&photo()).await.unwrap_err();
    assert!(matches!(err, ClientError::EmptyResponse), "got: {err}");
    server.await.expect("server");
}

#[tokio::test]
async fn missing_key_fails_before_any_request() {
    let config = GeminiConfig {
        endpoint: "http://127.0.0.1:9/v1beta".to_string(),
        ..GeminiConfig::default()
    };
    let client = GeminiClient::new(config, Arc::new(StaticCredentials::none())).expect("client");
    let err = client.restore(&photo()).await.unwrap_err();
    assert!(matches!(err, ClientError::CredentialMissing));
}
