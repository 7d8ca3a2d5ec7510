//! Wire-level tests for the DeepSeek backend against a mock HTTP server.

use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use taala_inference::{CancelToken, ChatBackend, ChatMessage, DeepSeekBackend, InferenceError};

fn backend_for(server: &MockServer) -> DeepSeekBackend {
    DeepSeekBackend::new(server.uri(), "deepseek-chat", Some("test-key".to_string()))
}

fn user_messages() -> Vec<ChatMessage> {
    vec![ChatMessage::user("写一篇关于露营的笔记")]
}

fn sse_body(fragments: &[&str]) -> String {
    let mut body = String::new();
    for fragment in fragments {
        body.push_str(&format!(
            "data: {{\"choices\":[{{\"delta\":{{\"content\":\"{}\"}}}}]}}\n\n",
            fragment
        ));
    }
    body.push_str("data: [DONE]\n");
    body
}

#[tokio::test]
async fn complete_extracts_first_choice_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({ "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "content": "好的，我们开始写露营笔记。" } }]
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let text = backend.complete(&user_messages()).await.unwrap();
    assert_eq!(text, "好的，我们开始写露营笔记。");
}

#[tokio::test]
async fn complete_surfaces_upstream_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let err = backend.complete(&user_messages()).await.unwrap_err();
    match err {
        InferenceError::Upstream { status, body } => {
            assert_eq!(status, 429);
            assert_eq!(body, "rate limited");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn stream_delivers_fragments_in_order_until_done() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({ "stream": true })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["好的", "，我们", "开始"]), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let stream = backend
        .complete_stream(&user_messages(), CancelToken::new())
        .await
        .unwrap();

    assert_eq!(stream.collect_text().await, "好的，我们开始");
}

#[tokio::test]
async fn stream_concatenation_matches_blocking_completion() {
    let server = MockServer::start().await;
    let full_text = "这是完整的回复内容";

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({ "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "content": full_text } }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({ "stream": true })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["这是", "完整的", "回复内容"]), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let blocking = backend.complete(&user_messages()).await.unwrap();
    let streamed = backend
        .complete_stream(&user_messages(), CancelToken::new())
        .await
        .unwrap()
        .collect_text()
        .await;

    assert_eq!(blocking, streamed);
}

#[tokio::test]
async fn stream_skips_malformed_frames() {
    let server = MockServer::start().await;
    let body = "data: {\"choices\":[{\"delta\":{\"content\":\"前\"}}]}\n\
                data: {broken json\n\
                : keep-alive comment\n\
                data: {\"choices\":[{\"delta\":{\"content\":\"后\"}}]}\n\
                data: [DONE]\n";
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let stream = backend
        .complete_stream(&user_messages(), CancelToken::new())
        .await
        .unwrap();

    assert_eq!(stream.collect_text().await, "前后");
}

#[tokio::test]
async fn stream_stops_at_done_sentinel() {
    let server = MockServer::start().await;
    let body = "data: {\"choices\":[{\"delta\":{\"content\":\"回复\"}}]}\n\
                data: [DONE]\n\
                data: {\"choices\":[{\"delta\":{\"content\":\"多余\"}}]}\n";
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let stream = backend
        .complete_stream(&user_messages(), CancelToken::new())
        .await
        .unwrap();

    assert_eq!(stream.collect_text().await, "回复");
}

#[tokio::test]
async fn stream_fails_on_upstream_status_before_any_fragment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let err = backend
        .complete_stream(&user_messages(), CancelToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, InferenceError::Upstream { status: 401, .. }));
}

#[tokio::test]
async fn stream_respects_pre_cancelled_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["永不", "交付"]), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let cancel = CancelToken::new();
    cancel.cancel();

    let stream = backend
        .complete_stream(&user_messages(), cancel)
        .await
        .unwrap();

    // Cancellation closes the stream normally with nothing delivered.
    assert_eq!(stream.collect_text().await, "");
}

#[tokio::test]
async fn transport_failure_is_a_transport_error() {
    // Point at a port nothing listens on.
    let backend = DeepSeekBackend::new("http://127.0.0.1:1", "deepseek-chat", None);
    let err = backend.complete(&user_messages()).await.unwrap_err();
    assert!(matches!(err, InferenceError::Transport(_)));
}
