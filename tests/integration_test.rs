use gemini_proxy::config::ProxyConfig;
use gemini_proxy::logging::SharedLogger;
use gemini_proxy::{build_router, AppState};
use std::net::SocketAddr;
use std::sync::Arc;

const TEST_KEY_ENV: &str = "GEMINI_PROXY_TEST_KEY";

fn test_config(base_url: &str) -> ProxyConfig {
    std::env::set_var(TEST_KEY_ENV, "test-key");
    ProxyConfig {
        port: 0,
        model: "gpt-4o".to_string(),
        base_url: base_url.to_string(),
        api_key_env: TEST_KEY_ENV.to_string(),
        timeout_secs: 5,
    }
}

async fn spawn_proxy(config: ProxyConfig) -> SocketAddr {
    let logger =
        SharedLogger::new(std::env::temp_dir().join("gemini-proxy-test.log")).unwrap();
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_secs))
        .build()
        .unwrap();

    let state = Arc::new(AppState {
        config,
        client,
        logger,
    });

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

/// Stand-in OpenAI-compatible provider serving a fixed chat completion.
async fn spawn_fake_upstream(response: serde_json::Value) -> SocketAddr {
    use axum::routing::post;

    let app = axum::Router::new().route(
        "/v1/chat/completions",
        post(move || {
            let response = response.clone();
            async move { axum::Json(response) }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

/// Stand-in provider that always fails with the given status and text body.
async fn spawn_failing_upstream(status: u16, body: String) -> SocketAddr {
    use axum::routing::post;

    let app = axum::Router::new().route(
        "/v1/chat/completions",
        post(move || {
            let body = body.clone();
            async move {
                (
                    axum::http::StatusCode::from_u16(status).unwrap(),
                    body,
                )
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

/// An address nothing is listening on, for connection-refused tests.
async fn unreachable_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

#[tokio::test]
async fn test_health_endpoint() {
    let addr = spawn_proxy(test_config("http://127.0.0.1:9")).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["proxy"], "gemini-proxy");
    assert_eq!(body["model"], "gpt-4o");

    let ts = body["timestamp"].as_str().unwrap();
    chrono::DateTime::parse_from_rfc3339(ts).expect("timestamp should be ISO-8601");
}

#[tokio::test]
async fn test_get_unknown_path_is_404() {
    let addr = spawn_proxy(test_config("http://127.0.0.1:9")).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{addr}/nope"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Not found");
}

#[tokio::test]
async fn test_options_preflight() {
    let addr = spawn_proxy(test_config("http://127.0.0.1:9")).await;
    let client = reqwest::Client::new();

    let resp = client
        .request(
            reqwest::Method::OPTIONS,
            format!("http://{addr}/any/path/at/all"),
        )
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let headers = resp.headers();
    assert_eq!(headers.get("access-control-allow-origin").unwrap(), "*");
    assert_eq!(
        headers.get("access-control-allow-methods").unwrap(),
        "GET, POST, PUT, DELETE, OPTIONS"
    );
    assert_eq!(
        headers.get("access-control-allow-headers").unwrap(),
        "Content-Type, Authorization"
    );
    assert!(resp.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_post_non_gemini_path_is_404() {
    let addr = spawn_proxy(test_config("http://127.0.0.1:9")).await;
    let client = reqwest::Client::new();

    // The target's own endpoint shape must not be recognized
    let resp = client
        .post(format!("http://{addr}/v1/chat/completions"))
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Not a Gemini API endpoint");
}

#[tokio::test]
async fn test_generate_content_roundtrip() {
    let upstream = spawn_fake_upstream(serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": "Hello there!"},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8}
    }))
    .await;

    let addr = spawn_proxy(test_config(&format!("http://{upstream}"))).await;
    let client = reqwest::Client::new();

    let req_body = serde_json::json!({
        "contents": [
            {"role": "user", "parts": [{"text": "Say hello"}]}
        ],
        "generationConfig": {"temperature": 0.0, "maxOutputTokens": 50}
    });

    let resp = client
        .post(format!(
            "http://{addr}/v1beta/models/gemini-pro:generateContent"
        ))
        .json(&req_body)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/json"
    );

    let body: serde_json::Value = resp.json().await.unwrap();
    let candidate = &body["candidates"][0];
    assert_eq!(candidate["content"]["role"], "model");
    assert_eq!(candidate["content"]["parts"][0]["text"], "Hello there!");
    assert_eq!(candidate["finishReason"], "STOP");
    assert_eq!(candidate["index"], 0);
    assert_eq!(candidate["safetyRatings"], serde_json::json!([]));
    assert_eq!(body["usageMetadata"]["promptTokenCount"], 5);
    assert_eq!(body["usageMetadata"]["candidatesTokenCount"], 3);
    assert_eq!(body["usageMetadata"]["totalTokenCount"], 8);
}

#[tokio::test]
async fn test_tool_call_roundtrip() {
    let upstream = spawn_fake_upstream(serde_json::json!({
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "lookup", "arguments": "{\"q\":\"rust\"}"}
                }]
            },
            "finish_reason": "tool_calls"
        }]
    }))
    .await;

    let addr = spawn_proxy(test_config(&format!("http://{upstream}"))).await;
    let client = reqwest::Client::new();

    let req_body = serde_json::json!({
        "contents": [{"role": "user", "parts": [{"text": "look up rust"}]}],
        "tools": [{"functionDeclarations": [{
            "name": "lookup",
            "description": "Search",
            "parameters": {"type": "object"}
        }]}]
    });

    let resp = client
        .post(format!(
            "http://{addr}/v1beta/models/gemini-pro:generateContent"
        ))
        .json(&req_body)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    let candidate = &body["candidates"][0];
    assert_eq!(candidate["finishReason"], "OTHER");
    assert_eq!(
        candidate["content"]["parts"][0]["functionCall"]["name"],
        "lookup"
    );
    assert_eq!(
        candidate["content"]["parts"][0]["functionCall"]["args"]["q"],
        "rust"
    );
}

#[tokio::test]
async fn test_empty_choices_is_internal_error() {
    let upstream = spawn_fake_upstream(serde_json::json!({"choices": []})).await;
    let addr = spawn_proxy(test_config(&format!("http://{upstream}"))).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!(
            "http://{addr}/v1beta/models/gemini-pro:generateContent"
        ))
        .json(&serde_json::json!({
            "contents": [{"role": "user", "parts": [{"text": "hi"}]}]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], 500);
    assert_eq!(body["error"]["status"], "INTERNAL_ERROR");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Proxy error:"));
}

#[tokio::test]
async fn test_invalid_body_is_internal_error() {
    let addr = spawn_proxy(test_config("http://127.0.0.1:9")).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!(
            "http://{addr}/v1beta/models/gemini-pro:generateContent"
        ))
        .header("Content-Type", "application/json")
        .body("not json at all")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["status"], "INTERNAL_ERROR");
}

#[tokio::test]
async fn test_upstream_error_body_with_multibyte_text() {
    // Multibyte character straddling the 500-byte truncation point: the
    // error must still come back as the envelope, never a dropped connection
    let error_body = format!("{}é body tail", "x".repeat(499));
    let upstream = spawn_failing_upstream(500, error_body).await;
    let addr = spawn_proxy(test_config(&format!("http://{upstream}"))).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!(
            "http://{addr}/v1beta/models/gemini-pro:generateContent"
        ))
        .json(&serde_json::json!({
            "contents": [{"role": "user", "parts": [{"text": "hi"}]}]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], 500);
    assert_eq!(body["error"]["status"], "INTERNAL_ERROR");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Proxy error:"));
}

#[tokio::test]
async fn test_unreachable_upstream_is_internal_error() {
    let upstream = unreachable_addr().await;
    let addr = spawn_proxy(test_config(&format!("http://{upstream}"))).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!(
            "http://{addr}/v1beta/models/gemini-pro:generateContent"
        ))
        .json(&serde_json::json!({
            "contents": [{"role": "user", "parts": [{"text": "hi"}]}]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], 500);
    assert_eq!(body["error"]["status"], "INTERNAL_ERROR");
}
