// Wire Contract for the Relay Gateway
//
// Decision: gRPC with tonic (industry standard, streaming built in)
// Decision: conversions live here so relay-core stays transport-free

// Generated protobuf code
pub mod proto {
    tonic::include_proto!("relay.llm.v1");
}

// Re-export for convenience
pub use proto::llm_service_client::LlmServiceClient;
pub use proto::llm_service_server::{LlmService, LlmServiceServer};

use relay_core::delta::{
    CodeExecutionDelta, Delta, ErrorDelta, GroundingDelta, GroundingSource, GroundingSupport,
    ToolCallDelta, UsageDelta,
};
use relay_core::request::{
    GenerateRequest, LlmConfig, Message, NativeTools, Role, ToolCall, ToolDefinition,
};

// ============================================================================
// Error types
// ============================================================================

/// Failure converting a proto request into the core model.
///
/// Every variant is a caller mistake; the servicer surfaces them as
/// `invalid_request` error deltas.
#[derive(Debug)]
pub enum ConversionError {
    MissingConfig,
    InvalidRole { index: usize, message: String },
}

impl std::fmt::Display for ConversionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversionError::MissingConfig => write!(f, "llm_config is required"),
            ConversionError::InvalidRole { index, message } => {
                write!(f, "{message} at index {index}")
            }
        }
    }
}

impl std::error::Error for ConversionError {}

// ============================================================================
// Request conversion (proto -> core)
// ============================================================================

/// Convert a proto request into the uniform core request.
pub fn request_from_proto(value: proto::GenerateRequest) -> Result<GenerateRequest, ConversionError> {
    let config = value.llm_config.ok_or(ConversionError::MissingConfig)?;

    let mut messages = Vec::with_capacity(value.messages.len());
    for (index, msg) in value.messages.into_iter().enumerate() {
        let role: Role = msg
            .role
            .parse()
            .map_err(|message| ConversionError::InvalidRole { index, message })?;
        messages.push(Message {
            role,
            content: msg.content,
            tool_calls: msg.tool_calls.into_iter().map(tool_call_from_proto).collect(),
            tool_call_id: msg.tool_call_id,
            tool_name: msg.tool_name,
        });
    }

    Ok(GenerateRequest {
        session_id: value.session_id,
        execution_id: value.execution_id,
        config: llm_config_from_proto(config),
        messages,
        tools: value
            .tools
            .into_iter()
            .map(|tool| ToolDefinition {
                name: tool.name,
                description: tool.description,
                parameters_schema: tool.parameters_schema,
            })
            .collect(),
    })
}

fn llm_config_from_proto(value: proto::LlmConfig) -> LlmConfig {
    let native_tools = NativeTools {
        google_search: value.native_tools.get("google_search").copied().unwrap_or(false),
        code_execution: value.native_tools.get("code_execution").copied().unwrap_or(false),
        url_context: value.native_tools.get("url_context").copied().unwrap_or(false),
    };
    LlmConfig {
        backend: value.backend,
        provider: value.provider,
        model: value.model,
        credential_env: value.api_key_env,
        project: value.project,
        location: value.location,
        native_tools,
    }
}

fn tool_call_from_proto(value: proto::ToolCall) -> ToolCall {
    ToolCall {
        id: value.id,
        name: value.name,
        arguments: value.arguments,
    }
}

// ============================================================================
// Delta conversion (core -> proto)
// ============================================================================

/// Convert one core delta into a wire response chunk.
pub fn delta_to_proto(value: Delta) -> proto::GenerateResponse {
    match value {
        Delta::Text(content) => response(proto::generate_response::Delta::Text(
            proto::TextDelta { content },
        )),
        Delta::Thinking(content) => response(proto::generate_response::Delta::Thinking(
            proto::ThinkingDelta { content },
        )),
        Delta::ToolCall(tc) => response(proto::generate_response::Delta::ToolCall(
            tool_call_delta_to_proto(tc),
        )),
        Delta::CodeExecution(ce) => response(proto::generate_response::Delta::CodeExecution(
            code_execution_to_proto(ce),
        )),
        Delta::Grounding(grounding) => response(proto::generate_response::Delta::Grounding(
            grounding_to_proto(grounding),
        )),
        Delta::Usage(usage) => response(proto::generate_response::Delta::Usage(usage_to_proto(
            usage,
        ))),
        Delta::Error(error) => proto::GenerateResponse {
            delta: Some(proto::generate_response::Delta::Error(error_to_proto(error))),
            is_final: true,
        },
        Delta::Final => proto::GenerateResponse {
            delta: None,
            is_final: true,
        },
    }
}

fn response(delta: proto::generate_response::Delta) -> proto::GenerateResponse {
    proto::GenerateResponse {
        delta: Some(delta),
        is_final: false,
    }
}

fn tool_call_delta_to_proto(value: ToolCallDelta) -> proto::ToolCallDelta {
    proto::ToolCallDelta {
        call_id: value.call_id,
        name: value.name,
        arguments: value.arguments,
    }
}

fn code_execution_to_proto(value: CodeExecutionDelta) -> proto::CodeExecutionDelta {
    proto::CodeExecutionDelta {
        code: value.code,
        result: value.result,
    }
}

fn usage_to_proto(value: UsageDelta) -> proto::UsageInfo {
    proto::UsageInfo {
        input_tokens: value.input_tokens,
        output_tokens: value.output_tokens,
        total_tokens: value.total_tokens,
        thinking_tokens: value.thinking_tokens,
    }
}

fn grounding_to_proto(value: GroundingDelta) -> proto::GroundingDelta {
    proto::GroundingDelta {
        web_search_queries: value.web_search_queries,
        sources: value.sources.into_iter().map(grounding_source_to_proto).collect(),
        supports: value.supports.into_iter().map(grounding_support_to_proto).collect(),
        search_entry_point_html: value.search_entry_point_html,
    }
}

fn grounding_source_to_proto(value: GroundingSource) -> proto::GroundingSource {
    proto::GroundingSource {
        uri: value.uri,
        title: value.title,
    }
}

fn grounding_support_to_proto(value: GroundingSupport) -> proto::GroundingSupport {
    proto::GroundingSupport {
        start_index: value.start_index,
        end_index: value.end_index,
        text: value.text,
        source_indices: value.source_indices,
    }
}

fn error_to_proto(value: ErrorDelta) -> proto::ErrorInfo {
    proto::ErrorInfo {
        message: value.message,
        code: value.code.as_str().to_string(),
        retryable: value.retryable,
    }
}
