use anyhow::{Context, Result};
use tonic::transport::Server;
use tracing_subscriber::EnvFilter;

use relay_protocol::LlmServiceServer;
use relay_server::{build_registry, LlmServiceImpl};

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials are resolved per-request from env vars named in each
    // request; a .env file is honored when present.
    if dotenvy::dotenv().is_ok() {
        tracing::debug!("loaded environment variables from .env");
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let port: u16 = std::env::var("GRPC_PORT")
        .unwrap_or_else(|_| "50051".to_string())
        .parse()
        .context("invalid GRPC_PORT")?;
    let addr: std::net::SocketAddr = format!("[::]:{port}")
        .parse()
        .context("invalid listen address")?;

    let registry = std::sync::Arc::new(build_registry());
    let service = LlmServiceImpl::new(registry);

    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<LlmServiceServer<LlmServiceImpl>>()
        .await;

    tracing::info!(%addr, "LLM gateway listening");

    Server::builder()
        .add_service(health_service)
        .add_service(service.into_server())
        .serve(addr)
        .await
        .context("gRPC server failed")?;

    Ok(())
}
