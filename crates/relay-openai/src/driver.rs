// OpenAI-protocol streaming driver
//
// Serves two provider families: OpenAI itself (Responses API for
// reasoning models, Chat Completions otherwise) and xAI (Chat Completions
// with reasoning_effort). The wire mode follows the resolved reasoning
// config, never an ad-hoc model check.

use std::sync::Arc;

use async_stream::stream;
use eventsource_stream::Eventsource;
use futures::{stream as futures_stream, StreamExt};
use tracing::{info, warn};

use relay_core::clients::{ClientCache, ClientKey};
use relay_core::delta::Delta;
use relay_core::error::ProviderFailure;
use relay_core::ids;
use relay_core::reasoning::{resolve_reasoning, ProviderKind, ReasoningConfig};
use relay_core::request::GenerateRequest;
use relay_core::retry::{generate_with_retries, RetryPolicy};
use relay_core::stream::{DeltaStream, NativePart, PartStream};

use crate::chat::{extract_chat, ChatRequest};
use crate::mapper::{build_chat_request, build_responses_request};
use crate::responses::{extract_responses, ResponsesRequest};

pub const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const OPENAI_RESPONSES_URL: &str = "https://api.openai.com/v1/responses";
pub const XAI_CHAT_URL: &str = "https://api.x.ai/v1/chat/completions";

/// Endpoint set, overridable for tests.
#[derive(Debug, Clone)]
pub struct OpenAiEndpoints {
    pub chat: String,
    pub responses: String,
    pub xai_chat: String,
}

impl Default for OpenAiEndpoints {
    fn default() -> Self {
        Self {
            chat: OPENAI_CHAT_URL.to_string(),
            responses: OPENAI_RESPONSES_URL.to_string(),
            xai_chat: XAI_CHAT_URL.to_string(),
        }
    }
}

/// One cached, configured upstream client.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
}

#[derive(Clone)]
enum WireBody {
    Chat(ChatRequest),
    Responses(ResponsesRequest),
}

#[derive(Clone)]
struct UpstreamCall {
    url: String,
    body: WireBody,
    provider: ProviderKind,
}

/// OpenAI-protocol streaming driver. Cheap to clone; shared cache inside.
#[derive(Clone)]
pub struct OpenAiDriver {
    clients: Arc<ClientCache<OpenAiClient>>,
    policy: RetryPolicy,
    endpoints: OpenAiEndpoints,
}

impl OpenAiDriver {
    pub fn new(clients: Arc<ClientCache<OpenAiClient>>) -> Self {
        Self {
            clients,
            policy: RetryPolicy::default(),
            endpoints: OpenAiEndpoints::default(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: OpenAiEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn plan_call(
        &self,
        kind: ProviderKind,
        request: &GenerateRequest,
    ) -> Result<UpstreamCall, ProviderFailure> {
        let chat_url = match kind {
            ProviderKind::Xai => self.endpoints.xai_chat.clone(),
            _ => self.endpoints.chat.clone(),
        };

        match resolve_reasoning(kind, &request.config.model) {
            ReasoningConfig::OpenAiResponses { effort, summary } => {
                Ok(UpstreamCall {
                    url: self.endpoints.responses.clone(),
                    body: WireBody::Responses(build_responses_request(request, effort, summary)?),
                    provider: kind,
                })
            }
            ReasoningConfig::XaiEffort { effort } => Ok(UpstreamCall {
                url: chat_url,
                body: WireBody::Chat(build_chat_request(request, Some(effort))?),
                provider: kind,
            }),
            _ => Ok(UpstreamCall {
                url: chat_url,
                body: WireBody::Chat(build_chat_request(request, None)?),
                provider: kind,
            }),
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

            let call = match driver.plan_call(kind, &request) {
                Ok(call) => call,
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
            let clients = Arc::clone(&driver.clients);

            let open = move || {
                let clients = Arc::clone(&clients);
                let key = key.clone();
                let call = call.clone();
                async move {
                    let client = clients.get_or_create(key, |credential| {
                        Ok(OpenAiClient {
                            http: reqwest::Client::new(),
                            api_key: credential.to_string(),
                        })
                    })?;
                    open_stream(client, call).await
                }
            };

            let mut deltas = generate_with_retries(request_id, driver.policy, None, open);
            while let Some(delta) = deltas.next().await {
                yield delta;
            }
        })
    }
}

async fn open_stream(
    client: Arc<OpenAiClient>,
    call: UpstreamCall,
) -> Result<PartStream, ProviderFailure> {
    let request = match &call.body {
        WireBody::Chat(body) => client.http.post(&call.url).json(body),
        WireBody::Responses(body) => client.http.post(&call.url).json(body),
    };

    let response = request
        .bearer_auth(&client.api_key)
        .send()
        .await
        .map_err(|e| ProviderFailure::provider(format!("failed to send request: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(ProviderFailure::provider(format!(
            "{} API error ({status}): {text}",
            call.provider
        )));
    }

    let extract: fn(&str) -> Result<Vec<NativePart>, ProviderFailure> = match call.body {
        WireBody::Chat(_) => extract_chat,
        WireBody::Responses(_) => extract_responses,
    };

    let parts = response
        .bytes_stream()
        .eventsource()
        .map(move |result| match result {
            Ok(event) => extract(&event.data),
            Err(e) => Err(ProviderFailure::provider(format!("stream error: {e}"))),
        })
        .flat_map(|result| match result {
            Ok(parts) => futures_stream::iter(parts.into_iter().map(Ok).collect::<Vec<_>>()),
            Err(failure) => futures_stream::iter(vec![Err(failure)]),
        });

    Ok(Box::pin(parts))
}
