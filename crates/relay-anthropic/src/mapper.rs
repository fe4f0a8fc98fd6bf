// Request mapping: uniform conversation -> Messages API body
//
// System prompt rides the dedicated field; tool results are user messages
// with tool_result blocks, the Messages API's only shape for them.

use relay_core::error::ProviderFailure;
use relay_core::reasoning::{resolve_reasoning, ProviderKind, ReasoningConfig};
use relay_core::request::{
    extract_system, parse_parameters_schema, parse_tool_arguments, GenerateRequest, Role,
};
use relay_core::tool_names::tool_name_to_api;
use serde_json::json;

use crate::types::{AnthropicMessage, AnthropicTool, ContentBlock, MessagesRequest, Thinking};

/// Where the request is headed; Vertex bodies omit the model and carry an
/// anthropic_version instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Direct,
    Vertex,
}

pub const VERTEX_ANTHROPIC_VERSION: &str = "vertex-2023-10-16";

pub fn build_request(
    request: &GenerateRequest,
    target: Target,
) -> Result<MessagesRequest, ProviderFailure> {
    let system = extract_system(&request.messages)?.map(str::to_string);

    let mut messages = Vec::with_capacity(request.messages.len());
    for msg in &request.messages {
        match msg.role {
            Role::System => {}
            Role::User => messages.push(AnthropicMessage {
                role: "user".to_string(),
                content: vec![ContentBlock::Text {
                    text: msg.content.clone(),
                }],
            }),
            Role::Assistant => {
                let mut content = Vec::new();
                if !msg.content.is_empty() {
                    content.push(ContentBlock::Text {
                        text: msg.content.clone(),
                    });
                }
                for tc in &msg.tool_calls {
                    content.push(ContentBlock::ToolUse {
                        id: tc.id.clone(),
                        name: tool_name_to_api(&tc.name)?,
                        input: parse_tool_arguments(&tc.arguments),
                    });
                }
                messages.push(AnthropicMessage {
                    role: "assistant".to_string(),
                    content,
                });
            }
            Role::Tool => messages.push(AnthropicMessage {
                role: "user".to_string(),
                content: vec![ContentBlock::ToolResult {
                    tool_use_id: msg.tool_call_id.clone(),
                    content: msg.content.clone(),
                }],
            }),
        }
    }

    let tools = if request.tools.is_empty() {
        None
    } else {
        let mut tools_out = Vec::with_capacity(request.tools.len());
        for tool in &request.tools {
            tools_out.push(AnthropicTool {
                name: tool_name_to_api(&tool.name)?,
                description: tool.description.clone(),
                input_schema: parse_parameters_schema(&tool.parameters_schema)
                    .unwrap_or_else(|| json!({})),
            });
        }
        Some(tools_out)
    };

    let (thinking, max_tokens) =
        match resolve_reasoning(ProviderKind::Anthropic, &request.config.model) {
            ReasoningConfig::AnthropicThinking {
                budget_tokens,
                max_tokens,
            } => (Some(Thinking::enabled(budget_tokens)), max_tokens),
            _ => (None, 4096),
        };

    Ok(MessagesRequest {
        model: match target {
            Target::Direct => Some(request.config.model.clone()),
            Target::Vertex => None,
        },
        anthropic_version: match target {
            Target::Direct => None,
            Target::Vertex => Some(VERTEX_ANTHROPIC_VERSION.to_string()),
        },
        messages,
        max_tokens,
        system,
        stream: true,
        tools,
        thinking,
    })
}
