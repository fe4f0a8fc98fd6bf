// Uniform response deltas
//
// Every unit emitted on an outbound Generate stream is one of these
// variants, regardless of which provider produced it. Error and Final are
// terminal: exactly one of them ends every stream.

use crate::error::ErrorCode;

/// One unit on the outbound response stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Delta {
    /// Partial assistant text.
    Text(String),
    /// Partial reasoning/chain-of-thought text.
    Thinking(String),
    /// A fully assembled tool invocation. Never emitted mid-assembly.
    ToolCall(ToolCallDelta),
    /// Provider-executed code and/or its result.
    CodeExecution(CodeExecutionDelta),
    /// Web-grounding metadata attributing parts of the answer to sources.
    Grounding(GroundingDelta),
    /// Token accounting for the whole stream.
    Usage(UsageDelta),
    /// Terminal failure. Carries the final marker on the wire.
    Error(ErrorDelta),
    /// Terminal success marker.
    Final,
}

impl Delta {
    /// Whether this delta terminates the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Delta::Final | Delta::Error(_))
    }
}

/// A complete tool invocation issued by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallDelta {
    /// Opaque id correlating a later tool result with this call.
    pub call_id: String,
    /// Canonical dot-separated tool name.
    pub name: String,
    /// Arguments as a JSON object string, `"{}"` when the model sent none.
    pub arguments: String,
}

/// Code the provider executed on its side, split across two deltas:
/// the code itself arrives with an empty `result`, the output arrives
/// with an empty `code`. Callers concatenate per conversation turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeExecutionDelta {
    pub code: String,
    pub result: String,
}

/// Token usage reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageDelta {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
    pub thinking_tokens: u32,
}

/// A cited web source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundingSource {
    pub uri: String,
    pub title: String,
}

/// A span of the answer supported by one or more sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundingSupport {
    pub start_index: u32,
    pub end_index: u32,
    pub text: String,
    /// Indices into [`GroundingDelta::sources`].
    pub source_indices: Vec<u32>,
}

/// Grounding metadata for the stream. At most one per stream, emitted
/// after all content deltas.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundingDelta {
    pub web_search_queries: Vec<String>,
    pub sources: Vec<GroundingSource>,
    pub supports: Vec<GroundingSupport>,
    pub search_entry_point_html: String,
}

/// Terminal error surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDelta {
    pub message: String,
    pub code: ErrorCode,
    /// Informative for the caller's own retry policy; in-process retry is
    /// driven by the guard, never by this flag.
    pub retryable: bool,
}
