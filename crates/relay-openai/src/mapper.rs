// Request mapping: uniform conversation -> Chat Completions / Responses body

use relay_core::error::ProviderFailure;
use relay_core::reasoning::{ReasoningEffort, ReasoningSummary};
use relay_core::request::{
    extract_system, parse_parameters_schema, parse_tool_arguments, GenerateRequest, Role,
};
use relay_core::tool_names::tool_name_to_api;

use crate::chat::{
    ChatFunction, ChatFunctionCall, ChatMessage, ChatRequest, ChatTool, ChatToolCall,
    StreamOptions,
};
use crate::responses::{InputItem, Reasoning, ResponsesRequest, ResponsesTool};

/// Build a Chat Completions request. `reasoning_effort` is set only for
/// xAI reasoning models.
pub fn build_chat_request(
    request: &GenerateRequest,
    reasoning_effort: Option<ReasoningEffort>,
) -> Result<ChatRequest, ProviderFailure> {
    // Validates the single-system rule; chat keeps the message in place.
    extract_system(&request.messages)?;

    let mut messages = Vec::with_capacity(request.messages.len());
    for msg in &request.messages {
        match msg.role {
            Role::System | Role::User => messages.push(ChatMessage {
                role: msg.role.as_str().to_string(),
                content: Some(msg.content.clone()),
                tool_calls: None,
                tool_call_id: None,
            }),
            Role::Assistant => {
                let tool_calls = if msg.tool_calls.is_empty() {
                    None
                } else {
                    let mut calls = Vec::with_capacity(msg.tool_calls.len());
                    for tc in &msg.tool_calls {
                        calls.push(ChatToolCall {
                            id: tc.id.clone(),
                            r#type: "function".to_string(),
                            function: ChatFunctionCall {
                                name: tool_name_to_api(&tc.name)?,
                                arguments: normalized_arguments(&tc.arguments),
                            },
                        });
                    }
                    Some(calls)
                };
                messages.push(ChatMessage {
                    role: "assistant".to_string(),
                    content: (!msg.content.is_empty()).then(|| msg.content.clone()),
                    tool_calls,
                    tool_call_id: None,
                });
            }
            Role::Tool => messages.push(ChatMessage {
                role: "tool".to_string(),
                content: Some(msg.content.clone()),
                tool_calls: None,
                tool_call_id: Some(msg.tool_call_id.clone()),
            }),
        }
    }

    Ok(ChatRequest {
        model: request.config.model.clone(),
        messages,
        stream: true,
        stream_options: StreamOptions {
            include_usage: true,
        },
        tools: build_chat_tools(request)?,
        reasoning_effort,
    })
}

/// Build a Responses API request with reasoning enabled.
pub fn build_responses_request(
    request: &GenerateRequest,
    effort: ReasoningEffort,
    summary: ReasoningSummary,
) -> Result<ResponsesRequest, ProviderFailure> {
    let instructions = extract_system(&request.messages)?.map(str::to_string);

    let mut input = Vec::with_capacity(request.messages.len());
    for msg in &request.messages {
        match msg.role {
            Role::System => {}
            Role::User => input.push(InputItem::Message {
                role: "user".to_string(),
                content: msg.content.clone(),
            }),
            Role::Assistant => {
                if !msg.content.is_empty() {
                    input.push(InputItem::Message {
                        role: "assistant".to_string(),
                        content: msg.content.clone(),
                    });
                }
                for tc in &msg.tool_calls {
                    input.push(InputItem::FunctionCall {
                        call_id: tc.id.clone(),
                        name: tool_name_to_api(&tc.name)?,
                        arguments: normalized_arguments(&tc.arguments),
                    });
                }
            }
            Role::Tool => input.push(InputItem::FunctionCallOutput {
                call_id: msg.tool_call_id.clone(),
                output: msg.content.clone(),
            }),
        }
    }

    let tools = if request.tools.is_empty() {
        None
    } else {
        let mut tools_out = Vec::with_capacity(request.tools.len());
        for tool in &request.tools {
            tools_out.push(ResponsesTool {
                r#type: "function".to_string(),
                name: tool_name_to_api(&tool.name)?,
                description: tool.description.clone(),
                parameters: parse_parameters_schema(&tool.parameters_schema),
            });
        }
        Some(tools_out)
    };

    Ok(ResponsesRequest {
        model: request.config.model.clone(),
        input,
        stream: true,
        instructions,
        reasoning: Reasoning { effort, summary },
        tools,
    })
}

fn build_chat_tools(request: &GenerateRequest) -> Result<Option<Vec<ChatTool>>, ProviderFailure> {
    if request.tools.is_empty() {
        return Ok(None);
    }
    let mut tools = Vec::with_capacity(request.tools.len());
    for tool in &request.tools {
        tools.push(ChatTool {
            r#type: "function".to_string(),
            function: ChatFunction {
                name: tool_name_to_api(&tool.name)?,
                description: tool.description.clone(),
                parameters: parse_parameters_schema(&tool.parameters_schema),
            },
        });
    }
    Ok(Some(tools))
}

/// Re-serialize the caller's argument string so malformed JSON degrades to
/// `{}` before it reaches the provider.
fn normalized_arguments(arguments: &str) -> String {
    parse_tool_arguments(arguments).to_string()
}
