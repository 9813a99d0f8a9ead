use super::gemini_types::{
    Candidate, CandidateContent, GenerateContentResponse, Part, UsageMetadata,
};
use super::openai_types::ChatCompletionResponse;
use crate::error::{ProxyError, Result};

/// Translate an `OpenAI` Chat Completion response into a Gemini
/// `generateContent` response. Pure function; only the first choice is used
/// (multi-candidate responses are not supported).
///
/// # Errors
/// Returns `ProxyError::EmptyChoices` if the provider returned no choices —
/// the one translation condition surfaced as a request-level failure.
pub fn openai_to_gemini(resp: &ChatCompletionResponse) -> Result<GenerateContentResponse> {
    let choice = resp.choices.first().ok_or(ProxyError::EmptyChoices)?;

    let mut parts: Vec<Part> = Vec::new();

    if let Some(ref text) = choice.message.content {
        if !text.is_empty() {
            parts.push(Part::text(text.clone()));
        }
    }

    for tool_call in &choice.message.tool_calls {
        let name = tool_call.function.name.as_deref().unwrap_or("unknown");
        let raw_args = tool_call.function.arguments.as_deref().unwrap_or("{}");
        // Malformed arguments are recovered silently, not surfaced as errors
        let args: serde_json::Value =
            serde_json::from_str(raw_args).unwrap_or_else(|_| serde_json::json!({}));

        parts.push(Part::function_call(name, args));
    }

    let finish_reason = map_finish_reason(choice.finish_reason.as_deref().unwrap_or("stop"));

    let usage = resp.usage.clone().unwrap_or_default();

    Ok(GenerateContentResponse {
        candidates: vec![Candidate {
            content: CandidateContent {
                parts,
                role: "model".to_string(),
            },
            finish_reason,
            index: 0,
            safety_ratings: vec![],
        }],
        usage_metadata: UsageMetadata {
            prompt_token_count: usage.prompt_tokens,
            candidates_token_count: usage.completion_tokens,
            total_token_count: usage.total_tokens,
        },
    })
}

/// Map `OpenAI` finish_reason to the Gemini vocabulary
pub fn map_finish_reason(reason: &str) -> String {
    match reason {
        "stop" => "STOP".to_string(),
        _ => "OTHER".to_string(),
    }
}
