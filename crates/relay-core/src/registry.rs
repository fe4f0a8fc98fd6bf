// Provider registry
//
// Maps backend names to provider adapters. Registration is one-shot at
// process start; lookups after that are read-only.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::request::GenerateRequest;
use crate::stream::DeltaStream;

/// Backend used when the request leaves the selector empty.
pub const DEFAULT_BACKEND: &str = "google-native";

/// A provider adapter serving one backend name.
///
/// Implementations never panic and never return early errors out-of-band:
/// every failure surfaces as a terminal error delta on the returned stream.
pub trait Provider: Send + Sync {
    /// Stream uniform deltas for one request.
    fn generate(&self, request: GenerateRequest) -> DeltaStream;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("no provider registered for backend '{backend}'. Available backends: {available}")]
pub struct UnknownBackend {
    pub backend: String,
    pub available: String,
}

/// Name -> adapter map.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider for a backend name.
    pub fn register(&mut self, backend: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(backend.into(), provider);
    }

    /// Look up the provider for a backend name.
    pub fn get(&self, backend: &str) -> Result<Arc<dyn Provider>, UnknownBackend> {
        self.providers.get(backend).cloned().ok_or_else(|| {
            let mut names: Vec<_> = self.providers.keys().map(String::as_str).collect();
            names.sort_unstable();
            let available = if names.is_empty() {
                "(none)".to_string()
            } else {
                names.join(", ")
            };
            UnknownBackend {
                backend: backend.to_string(),
                available,
            }
        })
    }
}
