// Request mapping: uniform conversation -> Gemini generateContent body
//
// System messages become systemInstruction; assistant turns carry text and
// functionCall parts; tool results ride as functionResponse parts in a
// user turn. Caller tools suppress every provider-built-in tool.

use relay_core::error::ProviderFailure;
use relay_core::reasoning::{resolve_reasoning, ProviderKind, ReasoningConfig, ThinkingLevel};
use relay_core::request::{
    extract_system, parse_parameters_schema, parse_tool_arguments, parse_tool_result,
    GenerateRequest, NativeTools, Role, ToolDefinition,
};
use relay_core::tool_names::tool_name_to_api;

use crate::types::{
    Content, FunctionCall, FunctionDeclaration, FunctionResponse, GenerateContentRequest,
    GenerationConfig, GoogleSearch, Part, ThinkingConfig, Tool, ToolCodeExecution, UrlContext,
};

/// Gemini is sampled at fixed temperature.
const TEMPERATURE: f32 = 1.0;

pub fn build_request(request: &GenerateRequest) -> Result<GenerateContentRequest, ProviderFailure> {
    let system_instruction = extract_system(&request.messages)?.map(|text| Content {
        role: None,
        parts: vec![Part::text(text)],
    });

    let mut contents = Vec::new();
    for msg in &request.messages {
        match msg.role {
            Role::System => {}
            Role::User => contents.push(Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(&msg.content)],
            }),
            Role::Assistant => {
                let mut parts = Vec::new();
                if !msg.content.is_empty() {
                    parts.push(Part::text(&msg.content));
                }
                for tc in &msg.tool_calls {
                    parts.push(Part::function_call(FunctionCall {
                        name: tool_name_to_api(&tc.name)?,
                        args: parse_tool_arguments(&tc.arguments),
                    }));
                }
                contents.push(Content {
                    role: Some("model".to_string()),
                    parts,
                });
            }
            Role::Tool => contents.push(Content {
                role: Some("user".to_string()),
                parts: vec![Part::function_response(FunctionResponse {
                    name: tool_name_to_api(&msg.tool_name)?,
                    response: parse_tool_result(&msg.content),
                })],
            }),
        }
    }

    Ok(GenerateContentRequest {
        contents,
        system_instruction,
        tools: build_tools(&request.tools, request.config.native_tools)?,
        generation_config: GenerationConfig {
            temperature: TEMPERATURE,
            thinking_config: Some(thinking_config(&request.config.model)),
        },
    })
}

fn thinking_config(model: &str) -> ThinkingConfig {
    match resolve_reasoning(ProviderKind::Google, model) {
        ReasoningConfig::GeminiBudget {
            thinking_budget,
            include_thoughts,
        } => ThinkingConfig {
            thinking_budget: Some(thinking_budget),
            thinking_level: None,
            include_thoughts,
        },
        _ => ThinkingConfig {
            thinking_budget: None,
            thinking_level: Some(ThinkingLevel::High),
            include_thoughts: true,
        },
    }
}

/// Convert caller tools and native-tool flags into Gemini tool entries.
///
/// Caller tools and native tools are mutually exclusive upstream; when any
/// caller tool is present the native flags are ignored.
fn build_tools(
    tools: &[ToolDefinition],
    native: NativeTools,
) -> Result<Option<Vec<Tool>>, ProviderFailure> {
    let mut result = Vec::new();

    if !tools.is_empty() {
        let mut declarations = Vec::with_capacity(tools.len());
        for tool in tools {
            declarations.push(FunctionDeclaration {
                name: tool_name_to_api(&tool.name)?,
                description: tool.description.clone(),
                parameters: parse_parameters_schema(&tool.parameters_schema),
            });
        }
        result.push(Tool {
            function_declarations: Some(declarations),
            ..Default::default()
        });
    } else if native.any() {
        if native.google_search {
            result.push(Tool {
                google_search: Some(GoogleSearch {}),
                ..Default::default()
            });
        }
        if native.code_execution {
            result.push(Tool {
                code_execution: Some(ToolCodeExecution {}),
                ..Default::default()
            });
        }
        if native.url_context {
            result.push(Tool {
                url_context: Some(UrlContext {}),
                ..Default::default()
            });
        }
    }

    Ok((!result.is_empty()).then_some(result))
}
