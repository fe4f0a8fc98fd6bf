// Error types for the gateway core

use thiserror::Error;

use crate::delta::ErrorDelta;

/// Short machine-readable code attached to terminal error deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Named credential env var is unset.
    Credentials,
    /// Malformed request: duplicate system message, unknown role, bad tool name.
    InvalidRequest,
    /// Unknown backend selector.
    InvalidBackend,
    /// Non-retryable failure inside a provider adapter.
    ProviderError,
    /// Transient upstream failure after deltas already escaped to the caller.
    PartialStreamError,
    /// All retry attempts exhausted on transient failures.
    MaxRetries,
    /// Unhandled failure caught by the dispatcher.
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Credentials => "credentials",
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::InvalidBackend => "invalid_backend",
            ErrorCode::ProviderError => "provider_error",
            ErrorCode::PartialStreamError => "partial_stream_error",
            ErrorCode::MaxRetries => "max_retries",
            ErrorCode::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-retryable provider failure with its wire code.
///
/// Retryable conditions (timeout, empty stream) are not failures: they are
/// signalled as [`crate::stream::AttemptEnd::Retryable`] so the guard can
/// decide whether a retry is safe.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderFailure {
    pub code: ErrorCode,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Named credential env var is unset.
    pub fn credentials(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Credentials, message)
    }

    /// The request itself is malformed.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Hard failure talking to the upstream provider.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProviderError, message)
    }
}

impl From<ProviderFailure> for ErrorDelta {
    fn from(failure: ProviderFailure) -> Self {
        ErrorDelta {
            message: failure.message,
            code: failure.code,
            retryable: false,
        }
    }
}
