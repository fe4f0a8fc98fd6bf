// Anthropic Messages API wire types

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Request
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    /// Omitted on Vertex, where the model lives in the URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Vertex-only body field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anthropic_version: Option<String>,
    pub messages: Vec<AnthropicMessage>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<AnthropicTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<Thinking>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
    ToolResult { tool_use_id: String, content: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct AnthropicTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct Thinking {
    pub r#type: String,
    pub budget_tokens: u32,
}

impl Thinking {
    pub fn enabled(budget_tokens: u32) -> Self {
        Self {
            r#type: "enabled".to_string(),
            budget_tokens,
        }
    }
}

// ============================================================================
// Streamed response events
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct MessageStart {
    pub message: MessageStartBody,
}

#[derive(Debug, Deserialize)]
pub struct MessageStartBody {
    pub usage: Option<InputUsage>,
}

#[derive(Debug, Deserialize)]
pub struct InputUsage {
    #[serde(default)]
    pub input_tokens: u32,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlockStart {
    #[serde(default)]
    pub index: u32,
    pub content_block: ContentBlockInfo,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlockInfo {
    ToolUse { id: String, name: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlockDeltaEvent {
    #[serde(default)]
    pub index: u32,
    pub delta: BlockDelta,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    TextDelta { text: String },
    ThinkingDelta { thinking: String },
    InputJsonDelta { partial_json: String },
    SignatureDelta { signature: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct MessageDeltaEvent {
    pub usage: Option<OutputUsage>,
}

#[derive(Debug, Deserialize)]
pub struct OutputUsage {
    #[serde(default)]
    pub output_tokens: u32,
}
