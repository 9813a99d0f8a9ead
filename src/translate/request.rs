//! Translate Gemini `generateContent` requests into `OpenAI` Chat Completions requests.
//!
//! Roles map bijectively within the supported set (`model` -> `assistant`,
//! `user` -> `user`); any other role (e.g. `system`) is silently dropped from
//! the message sequence, matching upstream Gemini CLI tooling expectations.
//! Function-call parts are flattened into an inline text marker on this path —
//! arguments are not preserved; only the response direction reconstructs
//! structured calls.

use super::gemini_types::{Content, GenerateContentRequest};
use super::openai_types::{ChatCompletionRequest, ChatFunction, ChatMessage, ChatTool};

const DEFAULT_TEMPERATURE: f64 = 0.1;
const DEFAULT_MAX_TOKENS: u64 = 4000;

/// Translate a Gemini request into an `OpenAI` Chat Completions request.
/// Pure function: `model` is the server-configured target model, never taken
/// from the client request.
pub fn gemini_to_openai(req: &GenerateContentRequest, model: &str) -> ChatCompletionRequest {
    let messages = req.contents.iter().filter_map(translate_content).collect();

    let (temperature, max_tokens) = req
        .generation_config
        .as_ref()
        .map(|gc| {
            (
                gc.temperature.unwrap_or(DEFAULT_TEMPERATURE),
                gc.max_output_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            )
        })
        .unwrap_or((DEFAULT_TEMPERATURE, DEFAULT_MAX_TOKENS));

    let tools = translate_tools(req);
    let tool_choice = tools.as_ref().map(|_| "auto".to_string());

    ChatCompletionRequest {
        model: model.to_string(),
        messages,
        temperature,
        max_tokens,
        stream: false,
        tools,
        tool_choice,
    }
}

/// A single `contents` entry becomes at most one chat message. Entries with
/// an unsupported role, or whose accumulated text trims to empty, are dropped.
fn translate_content(content: &Content) -> Option<ChatMessage> {
    let role = match content.role.as_str() {
        "model" => "assistant",
        "user" => "user",
        _ => return None,
    };

    let mut text = String::new();
    for part in &content.parts {
        if let Some(ref t) = part.text {
            text.push_str(t);
        }
        if let Some(ref call) = part.function_call {
            let name = call.name.as_deref().unwrap_or("unknown");
            text.push_str(&format!("\n[Function Call: {name}]"));
        }
    }

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    Some(ChatMessage {
        role: role.to_string(),
        content: trimmed.to_string(),
    })
}

/// Flatten every function declaration across every tool into one list.
/// Returns `None` when the flattened list is empty so both `tools` and
/// `tool_choice` are omitted from the outbound request.
fn translate_tools(req: &GenerateContentRequest) -> Option<Vec<ChatTool>> {
    let tools: Vec<ChatTool> = req
        .tools
        .iter()
        .flat_map(|t| &t.function_declarations)
        .map(|decl| ChatTool {
            tool_type: "function".to_string(),
            function: ChatFunction {
                name: decl.name.clone().unwrap_or_else(|| "unknown".to_string()),
                description: decl.description.clone().unwrap_or_default(),
                parameters: decl
                    .parameters
                    .clone()
                    .unwrap_or_else(|| serde_json::json!({})),
            },
        })
        .collect();

    if tools.is_empty() {
        None
    } else {
        Some(tools)
    }
}
