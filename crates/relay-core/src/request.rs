// Uniform conversation request
//
// Provider-agnostic request model. The transport layer converts the proto
// request into these types; provider drivers map them onto each vendor's
// native shape.

use serde_json::{json, Value};
use tracing::warn;

use crate::error::ProviderFailure;

/// One LLM generation request as seen by every provider adapter.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    /// Opaque caller session identifier, used for logging only.
    pub session_id: String,
    /// Opaque execution identifier, also keys the thought-signature cache.
    pub execution_id: String,
    pub config: LlmConfig,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
}

/// Provider selection and model configuration.
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    /// Backend (adapter) name; the dispatcher defaults it to `google-native`.
    pub backend: String,
    /// Vendor family, used by the multi backend: openai, anthropic, xai,
    /// google, vertexai.
    pub provider: String,
    pub model: String,
    /// Name of the environment variable holding the credential.
    pub credential_env: String,
    /// Cloud project for Vertex-hosted models.
    pub project: String,
    /// Cloud location for Vertex-hosted models.
    pub location: String,
    pub native_tools: NativeTools,
}

/// Provider-built-in tool flags. All of them are suppressed whenever the
/// caller declares tools of its own (upstream APIs refuse mixed
/// declarations).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NativeTools {
    pub google_search: bool,
    pub code_execution: bool,
    pub url_context: bool,
}

impl NativeTools {
    pub fn any(&self) -> bool {
        self.google_search || self.code_execution || self.url_context
    }
}

/// Message role in the uniform conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "tool" => Ok(Role::Tool),
            other => Err(format!(
                "unrecognized message role '{other}'. Expected one of: system, user, assistant, tool"
            )),
        }
    }
}

/// One conversation message.
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Tool calls issued by an assistant turn.
    pub tool_calls: Vec<ToolCall>,
    /// For tool-result messages: id of the originating call.
    pub tool_call_id: String,
    /// For tool-result messages: canonical name of the tool.
    pub tool_name: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            ..Default::default()
        }
    }
}

/// A tool call previously issued by the assistant.
#[derive(Debug, Clone, Default)]
pub struct ToolCall {
    pub id: String,
    /// Canonical dot-separated name.
    pub name: String,
    /// Arguments as a JSON object string.
    pub arguments: String,
}

/// A caller-defined tool declaration.
#[derive(Debug, Clone, Default)]
pub struct ToolDefinition {
    /// Canonical name of the form `segment(.segment)*`.
    pub name: String,
    pub description: String,
    /// JSON-schema string for the parameters object.
    pub parameters_schema: String,
}

/// Extract the single system message, if any.
///
/// A second system message is a protocol error; the failure message names
/// the index of the duplicate.
pub fn extract_system(messages: &[Message]) -> Result<Option<&str>, ProviderFailure> {
    let mut system = None;
    for (idx, msg) in messages.iter().enumerate() {
        if msg.role == Role::System {
            if system.is_some() {
                return Err(ProviderFailure::invalid_request(format!(
                    "duplicate system message at index {idx}; at most one is allowed"
                )));
            }
            system = Some(msg.content.as_str());
        }
    }
    Ok(system)
}

/// Parse a tool-call argument string into a JSON object.
///
/// Malformed arguments degrade to an empty object with a warning rather
/// than failing the request.
pub fn parse_tool_arguments(arguments: &str) -> Value {
    if arguments.is_empty() {
        return json!({});
    }
    match serde_json::from_str(arguments) {
        Ok(value) => value,
        Err(_) => {
            warn!(arguments, "failed to parse tool call arguments as JSON, using empty args");
            json!({})
        }
    }
}

/// Parse a tool-result string into a JSON value, wrapping non-JSON content
/// as `{"text": <content>}`.
pub fn parse_tool_result(content: &str) -> Value {
    if content.is_empty() {
        return json!({});
    }
    serde_json::from_str(content).unwrap_or_else(|_| json!({ "text": content }))
}

/// Parse a tool parameters schema string, `None` when empty or malformed.
pub fn parse_parameters_schema(schema: &str) -> Option<Value> {
    if schema.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(schema) {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(schema, "failed to parse tool parameters schema as JSON, omitting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_system_returns_single_instruction() {
        let messages = vec![Message::system("be brief"), Message::user("hi")];
        assert_eq!(extract_system(&messages).unwrap(), Some("be brief"));
    }

    #[test]
    fn extract_system_none_without_system_message() {
        let messages = vec![Message::user("hi")];
        assert_eq!(extract_system(&messages).unwrap(), None);
    }

    #[test]
    fn extract_system_rejects_duplicate_with_index() {
        let messages = vec![
            Message::system("first"),
            Message::user("hi"),
            Message::system("second"),
        ];
        let err = extract_system(&messages).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidRequest);
        assert!(err.message.contains("index 2"), "message: {}", err.message);
    }

    #[test]
    fn parse_tool_arguments_falls_back_to_empty_object() {
        assert_eq!(parse_tool_arguments(r#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(parse_tool_arguments("not json"), json!({}));
        assert_eq!(parse_tool_arguments(""), json!({}));
    }

    #[test]
    fn parse_tool_result_wraps_plain_text() {
        assert_eq!(parse_tool_result(r#"{"ok":true}"#), json!({"ok": true}));
        assert_eq!(parse_tool_result("plain output"), json!({"text": "plain output"}));
        assert_eq!(parse_tool_result(""), json!({}));
    }

    #[test]
    fn role_parsing_rejects_unknown() {
        assert!("assistant".parse::<Role>().is_ok());
        let err = "critic".parse::<Role>().unwrap_err();
        assert!(err.contains("critic"));
    }
}
