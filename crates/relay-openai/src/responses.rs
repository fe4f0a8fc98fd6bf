// Responses API wire mode
//
// OpenAI reasoning models stream reasoning summaries only through the
// Responses API. Function calls arrive as output items whose arguments
// stream separately, keyed by output index.

use relay_core::delta::UsageDelta;
use relay_core::error::ProviderFailure;
use relay_core::reasoning::{ReasoningEffort, ReasoningSummary};
use relay_core::stream::NativePart;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Request
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ResponsesRequest {
    pub model: String,
    pub input: Vec<InputItem>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub reasoning: Reasoning,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ResponsesTool>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reasoning {
    pub effort: ReasoningEffort,
    pub summary: ReasoningSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputItem {
    Message {
        role: String,
        content: String,
    },
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    FunctionCallOutput {
        call_id: String,
        output: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponsesTool {
    pub r#type: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

// ============================================================================
// Streamed response events
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ResponsesEvent {
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta { delta: String },
    #[serde(rename = "response.reasoning_summary_text.delta")]
    ReasoningSummaryTextDelta { delta: String },
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded { output_index: u32, item: OutputItem },
    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta { output_index: u32, delta: String },
    #[serde(rename = "response.completed")]
    Completed { response: CompletedResponse },
    #[serde(other)]
    Ignored,
}

#[derive(Debug, Deserialize)]
pub struct OutputItem {
    #[serde(default)]
    pub r#type: String,
    pub call_id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompletedResponse {
    pub usage: Option<ResponsesUsage>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsesUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
    pub output_tokens_details: Option<OutputTokensDetails>,
}

#[derive(Debug, Deserialize)]
pub struct OutputTokensDetails {
    #[serde(default)]
    pub reasoning_tokens: u32,
}

/// Reduce one Responses SSE data payload to native parts.
pub fn extract_responses(data: &str) -> Result<Vec<NativePart>, ProviderFailure> {
    let event: ResponsesEvent = serde_json::from_str(data)
        .map_err(|e| ProviderFailure::provider(format!("failed to parse event: {e}")))?;

    let parts = match event {
        ResponsesEvent::OutputTextDelta { delta } if !delta.is_empty() => {
            vec![NativePart::Text(delta)]
        }
        ResponsesEvent::ReasoningSummaryTextDelta { delta } if !delta.is_empty() => {
            vec![NativePart::Reasoning(delta)]
        }
        ResponsesEvent::OutputItemAdded { output_index, item }
            if item.r#type == "function_call" =>
        {
            vec![NativePart::FunctionCallFragment {
                index: output_index,
                id: item.call_id,
                name: item.name,
                arguments: String::new(),
            }]
        }
        ResponsesEvent::FunctionCallArgumentsDelta { output_index, delta } => {
            vec![NativePart::FunctionCallFragment {
                index: output_index,
                id: None,
                name: None,
                arguments: delta,
            }]
        }
        ResponsesEvent::Completed { response } => match response.usage {
            Some(usage) => vec![NativePart::Usage(UsageDelta {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
                total_tokens: usage.total_tokens,
                thinking_tokens: usage
                    .output_tokens_details
                    .map(|d| d.reasoning_tokens)
                    .unwrap_or(0),
            })],
            None => Vec::new(),
        },
        _ => Vec::new(),
    };

    Ok(parts)
}
