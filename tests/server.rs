use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::Engine;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header as header_eq, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chatdesk::config::parse_config;
use chatdesk::server::{build_router, AppState};

/// Router whose OpenAI and Anthropic entries point at `upstream` and whose
/// transcripts are written under `tmp`.
fn test_app(tmp: &TempDir, upstream: &str, extra: &str) -> Router {
    test_app_with_timeout(tmp, upstream, extra, 5)
}

fn test_app_with_timeout(tmp: &TempDir, upstream: &str, extra: &str, timeout_secs: u64) -> Router {
    let config = parse_config(&format!(
        r#"
[chat]
max_retries = 2
retry_backoff_ms = 1
timeout_secs = {timeout_secs}

[attachments]
max_files = 2
max_bytes = 64
max_chars = 40

[storage]
transcripts_dir = "{dir}"

[providers.openai]
api_key = "sk-test"
base_url = "{upstream}/v1"

[providers.anthropic]
api_key = "sk-ant-test"
base_url = "{upstream}/v1"

[providers.mistral]
api_key_env = "CHATDESK_TEST_UNSET_KEY"
{extra}"#,
        dir = tmp.path().join("transcripts").display(),
        upstream = upstream,
        extra = extra,
        timeout_secs = timeout_secs,
    ))
    .unwrap();
    build_router(AppState::new(config).unwrap())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn openai_reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-1",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": text } }]
    }))
}

fn b64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

// ============ Page and catalogs ============

#[tokio::test]
async fn health_reports_version() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp, "http://127.0.0.1:9", "");

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn index_page_is_rendered() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp, "http://127.0.0.1:9", "");

    let response = app.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let page = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(page.contains(r#"<option value="openai" selected>OpenAI</option>"#));
    assert!(page.contains("Mistral (no API key)"));
    assert!(page.contains(r#"value="tutor""#));
    assert!(page.contains("/static/app.js"));
    assert!(!page.contains("{{"));

    let response = app.clone().oneshot(get("/static/app.js")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("application/javascript"));
}

#[tokio::test]
async fn providers_and_personas_are_listed() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp, "http://127.0.0.1:9", "[providers.xai]\nenabled = false\n");

    let (status, body) = send(&app, get("/api/providers")).await;
    assert_eq!(status, StatusCode::OK);
    let providers = body.as_array().unwrap();
    let names: Vec<&str> = providers.iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["openai", "groq", "anthropic", "mistral"]);
    assert_eq!(providers[0]["configured"], true);
    assert_eq!(providers[3]["configured"], false);
    assert_eq!(providers[0]["default_model"], "gpt-4o-mini");

    let (status, body) = send(&app, get("/api/personas")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 5);
    assert_eq!(body[0]["name"], "assistant");
}

// ============ POST /api/chat ============

#[tokio::test]
async fn chat_openai_sends_persona_and_history() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header_eq("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({ "model": "gpt-4o-mini" })))
        .respond_with(openai_reply("Four."))
        .expect(1)
        .mount(&upstream)
        .await;

    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp, &upstream.uri(), "");

    let (status, body) = send(
        &app,
        post_json(
            "/api/chat",
            json!({
                "provider": "openai",
                "persona": "concise",
                "message": "And 2 + 2?",
                "history": [
                    { "role": "user", "content": "What is 1 + 1?" },
                    { "role": "assistant", "content": "Two." }
                ]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["reply"], "Four.");
    assert_eq!(body["provider"], "openai");
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["persona"], "concise");
    assert_eq!(body["user_message"], "And 2 + 2?");

    let requests = upstream.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let messages = sent["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0]["role"], "system");
    assert!(messages[0]["content"].as_str().unwrap().contains("shortest"));
    assert_eq!(messages[3]["content"], "And 2 + 2?");
}

#[tokio::test]
async fn chat_anthropic_uses_messages_api() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header_eq("x-api-key", "sk-ant-test"))
        .and(header_eq("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                { "type": "text", "text": "Hello " },
                { "type": "text", "text": "there." }
            ],
            "stop_reason": "end_turn"
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp, &upstream.uri(), "");

    let (status, body) = send(
        &app,
        post_json(
            "/api/chat",
            json!({
                "provider": "anthropic",
                "model": "claude-3-5-haiku-latest",
                "message": "Hi"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["reply"], "Hello there.");
    assert_eq!(body["model"], "claude-3-5-haiku-latest");

    let requests = upstream.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(sent["system"].as_str().unwrap().contains("helpful"));
    let messages = sent["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "user");
}

#[tokio::test]
async fn chat_retries_server_errors() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(1)
        .mount(&upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(openai_reply("Recovered."))
        .mount(&upstream)
        .await;

    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp, &upstream.uri(), "");

    let (status, body) = send(&app, post_json("/api/chat", json!({ "message": "ping" }))).await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["reply"], "Recovered.");
    assert_eq!(upstream.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn chat_client_errors_are_not_retried() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Incorrect API key provided", "type": "invalid_request_error" }
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp, &upstream.uri(), "");

    let (status, body) = send(&app, post_json("/api/chat", json!({ "message": "ping" }))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "upstream_error");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Incorrect API key provided"));
}

#[tokio::test]
async fn chat_gives_up_after_max_retries() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .expect(3)
        .mount(&upstream)
        .await;

    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp, &upstream.uri(), "");

    let (status, body) = send(&app, post_json("/api/chat", json!({ "message": "ping" }))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"]["message"].as_str().unwrap().contains("429"));
}

#[tokio::test]
async fn chat_provider_timeout_is_504() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(openai_reply("too late").set_delay(std::time::Duration::from_secs(3)))
        .mount(&upstream)
        .await;

    let tmp = TempDir::new().unwrap();
    let app = test_app_with_timeout(&tmp, &upstream.uri(), "", 1);

    let (status, body) = send(&app, post_json("/api/chat", json!({ "message": "ping" }))).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT, "body: {}", body);
    assert_eq!(body["error"]["code"], "timeout");
    assert!(body["error"]["message"].as_str().unwrap().contains("timed out"));
    // Timeouts are retried like 5xx: one attempt plus two retries.
    assert_eq!(upstream.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn chat_blank_reply_is_upstream_error() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(openai_reply("   "))
        .expect(1)
        .mount(&upstream)
        .await;

    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp, &upstream.uri(), "");

    let (status, body) = send(&app, post_json("/api/chat", json!({ "message": "ping" }))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "upstream_error");
    assert_eq!(body["error"]["message"], "openai returned an empty reply");
}

#[tokio::test]
async fn chat_missing_api_key_is_503() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp, "http://127.0.0.1:9", "");

    let (status, body) = send(
        &app,
        post_json("/api/chat", json!({ "provider": "mistral", "message": "bonjour" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "missing_api_key");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("CHATDESK_TEST_UNSET_KEY"));
}

#[tokio::test]
async fn chat_rejects_bad_requests() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp, "http://127.0.0.1:9", "");

    let (status, body) = send(
        &app,
        post_json("/api/chat", json!({ "provider": "cohere", "message": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(body["error"]["message"].as_str().unwrap().contains("cohere"));

    let (status, _) = send(&app, post_json("/api/chat", json!({ "message": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        post_json("/api/chat", json!({ "model": "grok-beta", "message": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let malformed = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn chat_includes_attachment_text() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(openai_reply("Noted."))
        .mount(&upstream)
        .await;

    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp, &upstream.uri(), "");

    let (status, body) = send(
        &app,
        post_json(
            "/api/chat",
            json!({
                "message": "Summarize",
                "attachments": [
                    { "filename": "notes.md", "content_type": "text/markdown", "data": b64(b"# Plan\nShip it.") }
                ]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(
        body["user_message"],
        "Summarize\n\nAttached file: notes.md\n```\n# Plan\nShip it.\n```"
    );
    assert_eq!(body["attachments"][0]["filename"], "notes.md");
    assert_eq!(body["attachments"][0]["truncated"], false);
}

// ============ POST /api/attachments ============

#[tokio::test]
async fn attachments_preview_and_limits() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp, "http://127.0.0.1:9", "");

    let long_text = "word ".repeat(12);
    let (status, body) = send(
        &app,
        post_json(
            "/api/attachments",
            json!({ "attachments": [
                { "filename": "C:\\Users\\me\\long.txt", "data": b64(long_text.as_bytes()) }
            ]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    let preview = &body["attachments"][0];
    assert_eq!(preview["filename"], "long.txt");
    assert_eq!(preview["content_type"], "text/plain");
    assert_eq!(preview["chars"], 40);
    assert_eq!(preview["truncated"], true);

    let (status, body) = send(
        &app,
        post_json(
            "/api/attachments",
            json!({ "attachments": [
                { "filename": "big.txt", "data": b64(&[b'a'; 200]) }
            ]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "payload_too_large");

    let one = json!({ "filename": "a.txt", "data": b64(b"a") });
    let (status, body) = send(
        &app,
        post_json("/api/attachments", json!({ "attachments": [one.clone(), one.clone(), one] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("too many"));

    let (status, _) = send(
        &app,
        post_json(
            "/api/attachments",
            json!({ "attachments": [{ "filename": "x.txt", "data": "!!not base64!!" }] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        post_json(
            "/api/attachments",
            json!({ "attachments": [{ "filename": "photo.png", "data": b64(b"\x89PNG") }] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("photo.png"));
}

// ============ POST /api/chat/retry ============

#[tokio::test]
async fn retry_resends_last_user_turn() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(openai_reply("A better answer."))
        .expect(1)
        .mount(&upstream)
        .await;

    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp, &upstream.uri(), "");

    let (status, body) = send(
        &app,
        post_json(
            "/api/chat/retry",
            json!({
                "provider": "openai",
                "history": [
                    { "role": "user", "content": "Name a prime." },
                    { "role": "assistant", "content": "Nine." }
                ]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["reply"], "A better answer.");
    assert_eq!(body["user_message"], "Name a prime.");

    let requests = upstream.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let messages = sent["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1]["content"], "Name a prime.");

    let (status, body) = send(
        &app,
        post_json("/api/chat/retry", json!({ "history": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("nothing to retry"));
}

#[tokio::test]
async fn retry_after_failed_send_reattaches_files() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .up_to_n_times(1)
        .mount(&upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(openai_reply("It says to ship."))
        .mount(&upstream)
        .await;

    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp, &upstream.uri(), "");
    let plan = json!({ "filename": "plan.md", "data": b64(b"Ship it.") });

    let (status, _) = send(
        &app,
        post_json("/api/chat", json!({ "message": "Summarize", "attachments": [plan.clone()] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    // The failed turn is in the history as typed; its files ride along.
    let (status, body) = send(
        &app,
        post_json(
            "/api/chat/retry",
            json!({
                "history": [{ "role": "user", "content": "Summarize" }],
                "attachments": [plan]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(
        body["user_message"],
        "Summarize\n\nAttached file: plan.md\n```\nShip it.\n```"
    );
    assert_eq!(body["attachments"][0]["filename"], "plan.md");

    let requests = upstream.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&requests[1].body).unwrap();
    let messages = sent["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert!(messages[1]["content"].as_str().unwrap().contains("Ship it."));
}

#[tokio::test]
async fn retry_without_attachments_keeps_recorded_context() {
    let tmp = TempDir::new().unwrap();
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(openai_reply("Again."))
        .mount(&upstream)
        .await;
    let app = test_app(&tmp, &upstream.uri(), "");

    let recorded = "Summarize\n\nAttached file: plan.md\n```\nShip it.\n```";
    let (status, body) = send(
        &app,
        post_json(
            "/api/chat/retry",
            json!({
                "history": [
                    { "role": "user", "content": recorded },
                    { "role": "assistant", "content": "Meh." }
                ]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["user_message"], recorded);
    assert!(body.get("attachments").is_none());
}

// ============ Transcripts ============

#[tokio::test]
async fn transcript_save_list_export_delete() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp, "http://127.0.0.1:9", "");

    let (status, body) = send(&app, get("/api/transcripts")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, saved) = send(
        &app,
        post_json(
            "/api/transcripts",
            json!({
                "provider": "groq",
                "model": "llama-3.1-8b-instant",
                "persona": "coder",
                "messages": [
                    { "role": "user", "content": "Write fizzbuzz" },
                    { "role": "assistant", "content": "for i in 1..=100 {}" }
                ]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "body: {}", saved);
    let id = saved["id"].as_str().unwrap().to_string();
    assert_eq!(saved["title"], "Write fizzbuzz");

    let (status, updated) = send(
        &app,
        post_json(
            "/api/transcripts",
            json!({
                "id": id,
                "provider": "groq",
                "model": "llama-3.1-8b-instant",
                "persona": "coder",
                "messages": [
                    { "role": "user", "content": "Write fizzbuzz" },
                    { "role": "assistant", "content": "for i in 1..=100 {}" },
                    { "role": "user", "content": "In Python" }
                ]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["id"], id.as_str());
    assert_eq!(updated["created_at"], saved["created_at"]);

    let (_, list) = send(&app, get("/api/transcripts")).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["message_count"], 3);

    let (status, loaded) = send(&app, get(&format!("/api/transcripts/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loaded["messages"][2]["content"], "In Python");

    let response = app
        .clone()
        .oneshot(get(&format!("/api/transcripts/{}/export?format=text", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"write-fizzbuzz-"));
    assert!(disposition.ends_with(".txt\""));
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("[user]\nIn Python"));

    let (status, _) = send(&app, get(&format!("/api/transcripts/{}/export", id))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) =
        send(&app, get(&format!("/api/transcripts/{}/export?format=docx", id))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/api/transcripts/{}", id))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, delete).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, get(&format!("/api/transcripts/{}", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn transcript_rejects_bad_input() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp, "http://127.0.0.1:9", "");

    let (status, _) = send(
        &app,
        post_json("/api/transcripts", json!({ "provider": "openai", "messages": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, get("/api/transcripts/not-a-uuid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("invalid transcript id"));
}
