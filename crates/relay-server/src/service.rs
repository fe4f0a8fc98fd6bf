// Generate servicer (dispatcher)
//
// Converts the wire request, resolves the backend, forwards the provider's
// deltas outward. Whatever happens, the outbound stream ends with exactly
// one terminal chunk: a stream that runs dry without one is completed with
// an internal error delta.

use std::pin::Pin;
use std::sync::Arc;

use async_stream::stream;
use futures::{Stream, StreamExt};
use tonic::{Request, Response, Status};
use tracing::{error, info, warn};

use relay_core::delta::{Delta, ErrorDelta};
use relay_core::error::ErrorCode;
use relay_core::registry::{ProviderRegistry, DEFAULT_BACKEND};
use relay_protocol::proto;
use relay_protocol::{delta_to_proto, request_from_proto, LlmService, LlmServiceServer};

pub struct LlmServiceImpl {
    registry: Arc<ProviderRegistry>,
}

impl LlmServiceImpl {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    /// Create a tonic server for this service.
    pub fn into_server(self) -> LlmServiceServer<Self> {
        LlmServiceServer::new(self)
    }
}

type ResponseStream = Pin<Box<dyn Stream<Item = Result<proto::GenerateResponse, Status>> + Send>>;

fn single_error(code: ErrorCode, message: String) -> ResponseStream {
    let chunk = delta_to_proto(Delta::Error(ErrorDelta {
        message,
        code,
        retryable: false,
    }));
    Box::pin(futures::stream::iter(vec![Ok(chunk)]))
}

#[tonic::async_trait]
impl LlmService for LlmServiceImpl {
    type GenerateStream = ResponseStream;

    async fn generate(
        &self,
        request: Request<proto::GenerateRequest>,
    ) -> Result<Response<Self::GenerateStream>, Status> {
        let proto_request = request.into_inner();
        info!(
            session_id = %proto_request.session_id,
            execution_id = %proto_request.execution_id,
            "received Generate request"
        );

        let core_request = match request_from_proto(proto_request) {
            Ok(core_request) => core_request,
            Err(e) => {
                warn!(error = %e, "malformed request");
                return Ok(Response::new(single_error(
                    ErrorCode::InvalidRequest,
                    e.to_string(),
                )));
            }
        };

        let backend = if core_request.config.backend.is_empty() {
            DEFAULT_BACKEND.to_string()
        } else {
            core_request.config.backend.clone()
        };

        let provider = match self.registry.get(&backend) {
            Ok(provider) => provider,
            Err(e) => {
                warn!(backend, "unknown backend");
                return Ok(Response::new(single_error(
                    ErrorCode::InvalidBackend,
                    e.to_string(),
                )));
            }
        };

        let session_id = core_request.session_id.clone();
        let mut inner = provider.generate(core_request);
        let outbound = stream! {
            let mut finished = false;
            while let Some(delta) = inner.next().await {
                finished |= delta.is_terminal();
                yield Ok(delta_to_proto(delta));
            }
            if !finished {
                error!(session_id, "provider stream ended without a terminal delta");
                yield Ok(delta_to_proto(Delta::Error(ErrorDelta {
                    message: "Internal error during generation".to_string(),
                    code: ErrorCode::Internal,
                    retryable: false,
                })));
                return;
            }
            info!(session_id, "completed Generate request");
        };

        Ok(Response::new(Box::pin(outbound)))
    }
}
