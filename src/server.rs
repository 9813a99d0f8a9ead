use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::logging::SharedLogger;
use crate::proxy;
use crate::translate::gemini_types::{GenerateContentRequest, GenerateContentResponse};

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: ProxyConfig,
    pub client: reqwest::Client,
    pub logger: SharedLogger,
}

/// The whole surface is one fallback handler rather than a routing table:
/// Gemini endpoint recognition is substring matching on the raw path, which
/// axum's router cannot express.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(handle_request)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Whether a path looks like a Gemini API call. Deliberately loose: plain
/// substring matching, order-independent, false positives included
/// (`/v1beta-unrelated` matches).
pub fn is_gemini_endpoint(path: &str) -> bool {
    path.contains("generateContent") || path.contains("/v1/models/") || path.contains("/v1beta/")
}

async fn handle_request(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    match method {
        Method::OPTIONS => preflight_response(),
        Method::GET => handle_get(&state, uri.path()),
        Method::POST => handle_post(&state, uri.path(), &body).await,
        _ => json_response(
            StatusCode::NOT_FOUND,
            &serde_json::json!({"error": "Not found"}),
        ),
    }
}

fn handle_get(state: &AppState, path: &str) -> Response {
    if path == "/health" {
        return json_response(
            StatusCode::OK,
            &serde_json::json!({
                "status": "healthy",
                "proxy": env!("CARGO_PKG_NAME"),
                "model": state.config.model,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }),
        );
    }

    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({"error": "Not found"}),
    )
}

async fn handle_post(state: &AppState, path: &str, body: &Bytes) -> Response {
    if !is_gemini_endpoint(path) {
        return json_response(
            StatusCode::NOT_FOUND,
            &serde_json::json!({"error": "Not a Gemini API endpoint"}),
        );
    }

    state
        .logger
        .info("server", format!("Intercepting Gemini API call: {}", path));

    // Single catch-point: every failure in the pipeline becomes the same
    // 500 envelope, decided in full before anything is written.
    match run_pipeline(state, body).await {
        Ok(resp) => json_response(StatusCode::OK, &resp),
        Err(e) => {
            state.logger.error("server", format!("Proxy error: {}", e));
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &serde_json::json!({
                    "error": {
                        "code": 500,
                        "message": format!("Proxy error: {}", e),
                        "status": "INTERNAL_ERROR",
                    }
                }),
            )
        }
    }
}

async fn run_pipeline(state: &AppState, body: &Bytes) -> Result<GenerateContentResponse> {
    let gemini_req: GenerateContentRequest = serde_json::from_slice(body)
        .map_err(|e| ProxyError::decode(format!("Invalid request body: {}", e)))?;

    proxy::forward_generate_content(&gemini_req, &state.config, &state.client, &state.logger).await
}

/// CORS preflight: permissive, empty body, headers only.
fn preflight_response() -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS",
        )
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .body(Body::empty())
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Every JSON response, success or error, carries the same two headers.
fn json_response<T: serde::Serialize>(status: StatusCode, body: &T) -> Response {
    let payload = serde_json::to_vec(body).unwrap_or_default();

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Body::from(payload))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_content_paths_match() {
        assert!(is_gemini_endpoint(
            "/v1beta/models/gemini-pro:generateContent"
        ));
        assert!(is_gemini_endpoint("/v1/models/gemini-pro:generateContent"));
        assert!(is_gemini_endpoint("/v1beta/anything"));
    }

    #[test]
    fn test_openai_paths_do_not_match() {
        assert!(!is_gemini_endpoint("/v1/chat/completions"));
        assert!(!is_gemini_endpoint("/v1/models"));
        assert!(!is_gemini_endpoint("/"));
    }

    #[test]
    fn test_substring_matching_is_loose() {
        // Known false positive of the substring predicate, kept on purpose
        assert!(is_gemini_endpoint("/v1beta/unrelated"));
        assert!(is_gemini_endpoint("/anything/generateContentWhatever"));
    }
}
