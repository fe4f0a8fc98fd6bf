// Relay Core
//
// Provider-agnostic heart of the gateway: the uniform request and delta
// model, the tool-name codec, the reasoning-config resolver, the two
// process-lifetime caches, the streaming engine, and the retry guard.
// Provider crates depend on this and nothing here depends on them.

pub mod clients;
pub mod delta;
pub mod error;
pub mod ids;
pub mod reasoning;
pub mod registry;
pub mod request;
pub mod retry;
pub mod signatures;
pub mod stream;
pub mod tool_names;

pub use clients::{ClientCache, ClientKey};
pub use delta::{
    CodeExecutionDelta, Delta, ErrorDelta, GroundingDelta, GroundingSource, GroundingSupport,
    ToolCallDelta, UsageDelta,
};
pub use error::{ErrorCode, ProviderFailure};
pub use reasoning::{resolve_reasoning, ProviderKind, ReasoningConfig};
pub use registry::{Provider, ProviderRegistry, UnknownBackend, DEFAULT_BACKEND};
pub use request::{
    GenerateRequest, LlmConfig, Message, NativeTools, Role, ToolCall, ToolDefinition,
};
pub use retry::{generate_with_retries, RetryPolicy};
pub use signatures::SignatureCache;
pub use stream::{
    drive_attempt, AttemptEnd, AttemptItem, DeltaStream, NativePart, PartStream, SignatureSink,
};
