// Relay gateway server
//
// Wires the provider registry and exposes the Generate servicer. The
// binary in main.rs adds transport and health plumbing around this.

pub mod service;

use std::sync::Arc;

use relay_anthropic::AnthropicDriver;
use relay_core::clients::ClientCache;
use relay_core::registry::ProviderRegistry;
use relay_core::signatures::SignatureCache;
use relay_google::{GeminiDriver, GoogleNativeProvider};
use relay_multi::MultiProvider;
use relay_openai::OpenAiDriver;

pub use service::LlmServiceImpl;

/// Build the process-wide registry: `google-native` plus the `multi`
/// backend, sharing one signature cache.
pub fn build_registry() -> ProviderRegistry {
    let signatures = Arc::new(SignatureCache::new());

    let gemini = GeminiDriver::new(Arc::new(ClientCache::new()), Arc::clone(&signatures));
    let openai = OpenAiDriver::new(Arc::new(ClientCache::new()));
    let anthropic = AnthropicDriver::new(Arc::new(ClientCache::new()), Arc::clone(&signatures));

    let mut registry = ProviderRegistry::new();
    registry.register(
        "google-native",
        Arc::new(GoogleNativeProvider::with_driver(gemini.clone())),
    );
    registry.register(
        "multi",
        Arc::new(MultiProvider::new(openai, anthropic, gemini)),
    );
    registry
}
