use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::logging::SharedLogger;
use crate::translate::gemini_types::{GenerateContentRequest, GenerateContentResponse};
use crate::translate::openai_types::{ChatCompletionRequest, ChatCompletionResponse};
use crate::translate::request::gemini_to_openai;
use crate::translate::response::openai_to_gemini;

/// User-Agent sent on every outbound provider call
pub const USER_AGENT: &str = concat!("gemini-proxy/", env!("CARGO_PKG_VERSION"));

/// Forward a Gemini `generateContent` request through the configured provider:
/// translate, POST to `{base_url}/v1/chat/completions`, translate the result
/// back. Every failure along the way comes back as a single `ProxyError` for
/// the handler to render.
pub async fn forward_generate_content(
    req: &GenerateContentRequest,
    config: &ProxyConfig,
    client: &reqwest::Client,
    logger: &SharedLogger,
) -> Result<GenerateContentResponse> {
    let openai_req = gemini_to_openai(req, &config.model);

    logger.info(
        "proxy",
        format!(
            "Forwarding to {} model={} messages={}",
            config.base_url,
            openai_req.model,
            openai_req.messages.len()
        ),
    );

    let openai_resp = call_chat_completions(&openai_req, config, client, logger).await?;
    let gemini_resp = openai_to_gemini(&openai_resp)?;

    logger.info(
        "proxy",
        format!(
            "Completed: prompt={} completion={} tokens",
            gemini_resp.usage_metadata.prompt_token_count,
            gemini_resp.usage_metadata.candidates_token_count
        ),
    );

    Ok(gemini_resp)
}

/// POST the translated request to the provider. Non-200 statuses and
/// transport failures both collapse into `ProxyError::Upstream`; the caller
/// does not distinguish them further.
async fn call_chat_completions(
    openai_req: &ChatCompletionRequest,
    config: &ProxyConfig,
    client: &reqwest::Client,
    logger: &SharedLogger,
) -> Result<ChatCompletionResponse> {
    let api_key = config.resolve_api_key()?;
    let url = format!(
        "{}/v1/chat/completions",
        config.base_url.trim_end_matches('/')
    );

    let response = client
        .post(&url)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .header("User-Agent", USER_AGENT)
        .json(openai_req)
        .send()
        .await
        .map_err(|e| ProxyError::upstream(format!("Request failed: {}", e)))?;

    let status = response.status().as_u16();
    let is_json = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    let body = response
        .text()
        .await
        .map_err(|e| ProxyError::upstream(format!("Failed to read response body: {}", e)))?;

    logger.debug(
        "proxy",
        format!("Response status={} body_len={}", status, body.len()),
    );

    if status != 200 {
        // Keep the upstream detail JSON-shaped when the provider says it is
        let detail = if is_json {
            serde_json::from_str::<serde_json::Value>(&body)
                .map(|v| v.to_string())
                .unwrap_or(body)
        } else {
            body
        };

        logger.warn("proxy", format!("Provider error status={}", status));

        return Err(ProxyError::upstream(format!(
            "API error: {} - {}",
            status,
            truncate(&detail, 500)
        )));
    }

    serde_json::from_str(&body).map_err(|e| {
        ProxyError::decode(format!(
            "Failed to parse provider response: {}. Body: {}",
            e,
            truncate(&body, 300)
        ))
    })
}

/// Truncate to at most `max` bytes without splitting a UTF-8 character, so
/// arbitrary upstream bodies can never panic the pipeline.
fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
