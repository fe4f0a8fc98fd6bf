// Multi-provider backend
//
// Routes on the request's provider family and hands the call to the
// matching direct driver. Vertex-hosted models split by underlying
// family: claude models go to the Anthropic driver, everything else to
// the Gemini driver.

use futures::stream;
use tracing::warn;

use relay_core::delta::Delta;
use relay_core::error::ProviderFailure;
use relay_core::reasoning::ProviderKind;
use relay_core::registry::Provider;
use relay_core::request::GenerateRequest;
use relay_core::stream::DeltaStream;

use relay_anthropic::AnthropicDriver;
use relay_google::GeminiDriver;
use relay_openai::OpenAiDriver;

pub struct MultiProvider {
    openai: OpenAiDriver,
    anthropic: AnthropicDriver,
    google: GeminiDriver,
}

impl MultiProvider {
    pub fn new(openai: OpenAiDriver, anthropic: AnthropicDriver, google: GeminiDriver) -> Self {
        Self {
            openai,
            anthropic,
            google,
        }
    }

    fn route(&self, kind: ProviderKind, request: GenerateRequest) -> DeltaStream {
        match kind {
            ProviderKind::OpenAi | ProviderKind::Xai => self.openai.generate(kind, request),
            ProviderKind::Anthropic => self.anthropic.generate(kind, request),
            ProviderKind::Google => self.google.generate(request),
            ProviderKind::VertexAi => {
                let model = request.config.model.to_lowercase();
                if model.contains("claude") || model.contains("anthropic") {
                    self.anthropic.generate(kind, request)
                } else {
                    self.google.generate(request)
                }
            }
        }
    }
}

impl Provider for MultiProvider {
    fn generate(&self, request: GenerateRequest) -> DeltaStream {
        match request.config.provider.parse::<ProviderKind>() {
            Ok(kind) => self.route(kind, request),
            Err(_) => {
                warn!(provider = %request.config.provider, "unsupported provider");
                let supported = ProviderKind::ALL
                    .iter()
                    .map(|p| p.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                let failure = ProviderFailure::invalid_request(format!(
                    "unsupported provider '{}'. Supported: {supported}",
                    request.config.provider
                ));
                Box::pin(stream::iter(vec![Delta::Error(failure.into())]))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use relay_core::clients::ClientCache;
    use relay_core::error::ErrorCode;
    use relay_core::request::LlmConfig;
    use relay_core::signatures::SignatureCache;
    use std::sync::Arc;

    fn provider() -> MultiProvider {
        let signatures = Arc::new(SignatureCache::new());
        MultiProvider::new(
            OpenAiDriver::new(Arc::new(ClientCache::new())),
            AnthropicDriver::new(Arc::new(ClientCache::new()), Arc::clone(&signatures)),
            GeminiDriver::new(Arc::new(ClientCache::new()), signatures),
        )
    }

    #[tokio::test]
    async fn unsupported_provider_is_invalid_request() {
        let request = GenerateRequest {
            config: LlmConfig {
                provider: "ollama".into(),
                model: "llama3".into(),
                ..Default::default()
            },
            ..Default::default()
        };

        let deltas: Vec<Delta> = provider().generate(request).collect().await;
        assert_eq!(deltas.len(), 1);
        match &deltas[0] {
            Delta::Error(err) => {
                assert_eq!(err.code, ErrorCode::InvalidRequest);
                assert!(err.message.contains("'ollama'"));
                assert!(err.message.contains("openai, anthropic, xai, google, vertexai"));
            }
            other => panic!("unexpected delta {other:?}"),
        }
    }

    #[tokio::test]
    async fn known_provider_with_missing_credentials_reports_credentials() {
        let request = GenerateRequest {
            config: LlmConfig {
                provider: "anthropic".into(),
                model: "claude-sonnet-4".into(),
                credential_env: "MULTI_TEST_UNSET_KEY".into(),
                ..Default::default()
            },
            messages: vec![relay_core::request::Message::user("hi")],
            ..Default::default()
        };

        let deltas: Vec<Delta> = provider().generate(request).collect().await;
        assert_eq!(deltas.len(), 1);
        match &deltas[0] {
            Delta::Error(err) => {
                assert_eq!(err.code, ErrorCode::Credentials);
                assert!(err.message.contains("MULTI_TEST_UNSET_KEY"));
            }
            other => panic!("unexpected delta {other:?}"),
        }
    }
}
