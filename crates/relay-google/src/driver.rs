// Gemini streaming driver
//
// Opens a streamGenerateContent SSE call per attempt and feeds the
// extracted parts through the core engine and retry guard. Serves two
// hosts: the API-key Gemini endpoint and Vertex-hosted Gemini models
// (bearer credential, URL built from project/location).

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

use crate::extract::ChunkExtractor;
use crate::types::{GenerateContentChunk, GenerateContentRequest};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// How a request authenticates against its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    /// `x-goog-api-key` header (Gemini API).
    ApiKey,
    /// `Authorization: Bearer` (Vertex AI).
    Bearer,
}

/// One cached, configured upstream client.
pub struct GeminiClient {
    http: reqwest::Client,
    credential: String,
}

/// Gemini streaming driver. Cheap to clone; shared caches inside.
#[derive(Clone)]
pub struct GeminiDriver {
    clients: Arc<ClientCache<GeminiClient>>,
    signatures: Arc<SignatureCache>,
    policy: RetryPolicy,
    api_base: String,
}

impl GeminiDriver {
    pub fn new(clients: Arc<ClientCache<GeminiClient>>, signatures: Arc<SignatureCache>) -> Self {
        Self {
            clients,
            signatures,
            policy: RetryPolicy::default(),
            api_base: GEMINI_API_BASE.to_string(),
        }
    }

    /// Override the Gemini API base URL (tests point this at a mock).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn endpoint(&self, config: &LlmConfig) -> (String, Auth) {
        if config.provider == ProviderKind::VertexAi.as_str() {
            let url = format!(
                "https://{loc}-aiplatform.googleapis.com/v1/projects/{project}/locations/{loc}/publishers/google/models/{model}:streamGenerateContent?alt=sse",
                loc = config.location,
                project = config.project,
                model = config.model,
            );
            (url, Auth::Bearer)
        } else {
            (
                format!(
                    "{}/models/{}:streamGenerateContent?alt=sse",
                    self.api_base, config.model
                ),
                Auth::ApiKey,
            )
        }
    }

    pub fn generate(&self, request: GenerateRequest) -> DeltaStream {
        let driver = self.clone();
        Box::pin(stream! {
            let request_id = ids::short_id();
            info!(
                request_id,
                model = %request.config.model,
                session_id = %request.session_id,
                execution_id = %request.execution_id,
                "generate"
            );

            let body = match crate::mapper::build_request(&request) {
                Ok(body) => body,
                Err(failure) => {
                    warn!(request_id, error = %failure, "request mapping failed");
                    yield Delta::Error(failure.into());
                    return;
                }
            };

            let (url, auth) = driver.endpoint(&request.config);
            let provider = if request.config.provider.is_empty() {
                ProviderKind::Google.as_str().to_string()
            } else {
                request.config.provider.clone()
            };
            let key = ClientKey::new(provider, &request.config.model, &request.config.credential_env);
            let sink = SignatureSink::new(Arc::clone(&driver.signatures), &request.execution_id);
            let clients = Arc::clone(&driver.clients);

            let open = move || {
                let clients = Arc::clone(&clients);
                let key = key.clone();
                let url = url.clone();
                let body = body.clone();
                async move {
                    let client = clients.get_or_create(key, |credential| {
                        Ok(GeminiClient {
                            http: reqwest::Client::new(),
                            credential: credential.to_string(),
                        })
                    })?;
                    open_stream(client, url, auth, body).await
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
    client: Arc<GeminiClient>,
    url: String,
    auth: Auth,
    body: GenerateContentRequest,
) -> Result<PartStream, ProviderFailure> {
    let request = client.http.post(&url).json(&body);
    let request = match auth {
        Auth::ApiKey => request.header("x-goog-api-key", &client.credential),
        Auth::Bearer => request.bearer_auth(&client.credential),
    };

    let response = request
        .send()
        .await
        .map_err(|e| ProviderFailure::provider(format!("failed to send request: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(ProviderFailure::provider(format!(
            "Gemini API error ({status}): {text}"
        )));
    }

    let mut extractor = ChunkExtractor::new();
    let parts = response
        .bytes_stream()
        .eventsource()
        .map(move |result| match result {
            Ok(event) => match serde_json::from_str::<GenerateContentChunk>(&event.data) {
                Ok(chunk) => Ok(extractor.extract(chunk)),
                Err(e) => Err(ProviderFailure::provider(format!(
                    "failed to parse chunk: {e}"
                ))),
            },
            Err(e) => Err(ProviderFailure::provider(format!("stream error: {e}"))),
        })
        .flat_map(|result| match result {
            Ok(parts) => futures_stream::iter(parts.into_iter().map(Ok).collect::<Vec<_>>()),
            Err(failure) => futures_stream::iter(vec![Err(failure)]),
        });

    Ok(Box::pin(parts))
}
