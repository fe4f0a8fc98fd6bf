// Anthropic streaming driver
//
// Messages API SSE per attempt, direct or Vertex-hosted. Direct calls use
// x-api-key + anthropic-version headers; Vertex calls use a bearer
// credential and carry the version in the body.

use std::sync::Arc;

use async_stream::stream;
use eventsource_stream::Eventsource;
use futures::{stream as futures_stream, StreamExt};
use tracing::{info, warn};

use relay_core::clients::{ClientCache, ClientKey};
use relay_core::delta::Delta;
use relay_core::error::ProviderFailure;
use relay_core::ids;
use relay_core::reasoning::ProviderKind;
use relay_core::request::{GenerateRequest, LlmConfig};
use relay_core::retry::{generate_with_retries, RetryPolicy};
use relay_core::signatures::SignatureCache;
use relay_core::stream::{DeltaStream, PartStream, SignatureSink};

use crate::extract::EventExtractor;
use crate::mapper::{build_request, Target};
use crate::types::MessagesRequest;

pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// One cached, configured upstream client.
pub struct AnthropicClient {
    http: reqwest::Client,
    credential: String,
}

/// Anthropic streaming driver. Cheap to clone; shared caches inside.
#[derive(Clone)]
pub struct AnthropicDriver {
    clients: Arc<ClientCache<AnthropicClient>>,
    signatures: Arc<SignatureCache>,
    policy: RetryPolicy,
    api_url: String,
}

impl AnthropicDriver {
    pub fn new(
        clients: Arc<ClientCache<AnthropicClient>>,
        signatures: Arc<SignatureCache>,
    ) -> Self {
        Self {
            clients,
            signatures,
            policy: RetryPolicy::default(),
            api_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    /// Override the Messages API URL (tests point this at a mock).
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn endpoint(&self, kind: ProviderKind, config: &LlmConfig) -> (String, Target) {
        if kind == ProviderKind::VertexAi {
            let url = format!(
                "https://{loc}-aiplatform.googleapis.com/v1/projects/{project}/locations/{loc}/publishers/anthropic/models/{model}:streamRawPredict",
                loc = config.location,
                project = config.project,
                model = config.model,
            );
            (url, Target::Vertex)
        } else {
            (self.api_url.clone(), Target::Direct)
        }
    }

    pub fn generate(&self, kind: ProviderKind, request: GenerateRequest) -> DeltaStream {
        let driver = self.clone();
        Box::pin(stream! {
            let request_id = ids::short_id();
            info!(
                request_id,
                provider = %kind,
                model = %request.config.model,
                session_id = %request.session_id,
                execution_id = %request.execution_id,
                "generate"
            );

            let (url, target) = driver.endpoint(kind, &request.config);
            let body = match build_request(&request, target) {
                Ok(body) => body,
                Err(failure) => {
                    warn!(request_id, error = %failure, "request mapping failed");
                    yield Delta::Error(failure.into());
                    return;
                }
            };

            let key = ClientKey::new(
                kind.as_str(),
                &request.config.model,
                &request.config.credential_env,
            );
            let sink = SignatureSink::new(Arc::clone(&driver.signatures), &request.execution_id);
            let clients = Arc::clone(&driver.clients);

            let open = move || {
                let clients = Arc::clone(&clients);
                let key = key.clone();
                let url = url.clone();
                let body = body.clone();
                async move {
                    let client = clients.get_or_create(key, |credential| {
                        Ok(AnthropicClient {
                            http: reqwest::Client::new(),
                            credential: credential.to_string(),
                        })
                    })?;
                    open_stream(client, url, target, body).await
                }
            };

            let mut deltas = generate_with_retries(request_id, driver.policy, Some(sink), open);
            while let Some(delta) = deltas.next().await {
                yield delta;
            }
        })
    }
}

async fn open_stream(
    client: Arc<AnthropicClient>,
    url: String,
    target: Target,
    body: MessagesRequest,
) -> Result<PartStream, ProviderFailure> {
    let request = client.http.post(&url).json(&body);
    let request = match target {
        Target::Direct => request
            .header("x-api-key", &client.credential)
            .header("anthropic-version", ANTHROPIC_VERSION),
        Target::Vertex => request.bearer_auth(&client.credential),
    };

    let response = request
        .send()
        .await
        .map_err(|e| ProviderFailure::provider(format!("failed to send request: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(ProviderFailure::provider(format!(
            "Anthropic API error ({status}): {text}"
        )));
    }

    let mut extractor = EventExtractor::new();
    let parts = response
        .bytes_stream()
        .eventsource()
        .map(move |result| match result {
            Ok(event) => extractor.extract(&event.event, &event.data),
            Err(e) => Err(ProviderFailure::provider(format!("stream error: {e}"))),
        })
        .flat_map(|result| match result {
            Ok(parts) => futures_stream::iter(parts.into_iter().map(Ok).collect::<Vec<_>>()),
            Err(failure) => futures_stream::iter(vec![Err(failure)]),
        });

    Ok(Box::pin(parts))
}
