// Chat Completions wire mode
//
// Used for non-reasoning OpenAI models and for xAI, whose endpoint speaks
// the same protocol plus `reasoning_effort` / `reasoning_content`.

use relay_core::delta::UsageDelta;
use relay_core::error::ProviderFailure;
use relay_core::reasoning::ReasoningEffort;
use relay_core::stream::NativePart;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Request
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub stream_options: StreamOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ChatTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamOptions {
    pub include_usage: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ChatToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatToolCall {
    pub id: String,
    pub r#type: String,
    pub function: ChatFunctionCall,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatFunctionCall {
    pub name: String,
    /// Arguments as a JSON object string.
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatTool {
    pub r#type: String,
    pub function: ChatFunction,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatFunction {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

// ============================================================================
// Streamed response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub delta: ChatDelta,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatDelta {
    #[serde(default)]
    pub content: Option<String>,
    /// xAI reasoning stream.
    #[serde(default)]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ChatStreamToolCall>>,
}

#[derive(Debug, Deserialize)]
pub struct ChatStreamToolCall {
    pub index: u32,
    pub id: Option<String>,
    pub function: Option<ChatStreamFunction>,
}

#[derive(Debug, Deserialize)]
pub struct ChatStreamFunction {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
    pub completion_tokens_details: Option<CompletionTokensDetails>,
}

#[derive(Debug, Deserialize)]
pub struct CompletionTokensDetails {
    #[serde(default)]
    pub reasoning_tokens: u32,
}

/// Reduce one SSE data payload to native parts. `[DONE]` is the protocol's
/// end-of-stream sentinel and produces nothing.
pub fn extract_chat(data: &str) -> Result<Vec<NativePart>, ProviderFailure> {
    if data == "[DONE]" {
        return Ok(Vec::new());
    }

    let chunk: ChatChunk = serde_json::from_str(data)
        .map_err(|e| ProviderFailure::provider(format!("failed to parse chunk: {e}")))?;

    let mut out = Vec::new();
    if let Some(choice) = chunk.choices.into_iter().next() {
        if let Some(reasoning) = choice.delta.reasoning_content {
            if !reasoning.is_empty() {
                out.push(NativePart::Reasoning(reasoning));
            }
        }
        if let Some(content) = choice.delta.content {
            if !content.is_empty() {
                out.push(NativePart::Text(content));
            }
        }
        for tc in choice.delta.tool_calls.unwrap_or_default() {
            let (name, arguments) = match tc.function {
                Some(function) => (function.name, function.arguments.unwrap_or_default()),
                None => (None, String::new()),
            };
            out.push(NativePart::FunctionCallFragment {
                index: tc.index,
                id: tc.id,
                name,
                arguments,
            });
        }
    }

    if let Some(usage) = chunk.usage {
        out.push(NativePart::Usage(UsageDelta {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            thinking_tokens: usage
                .completion_tokens_details
                .map(|d| d.reasoning_tokens)
                .unwrap_or(0),
        }));
    }

    Ok(out)
}
