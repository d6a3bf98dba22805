//! # Tutor Gateway Server
//!
//! Serves the tutoring API over HTTP until Ctrl-C or SIGTERM.

use std::net::SocketAddr;
use tracing::info;
use tutor_gateway::{create_router, AppState, Config, GracefulShutdown};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from CLI args and .env file
    let config = Config::parse_args();

    let state = AppState::new(config.clone())?;
    let rotation = state.service().rotation_status();
    let app = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!("🚀 Tutor gateway starting on http://{}", listener.local_addr()?);
    info!("Model: {}", config.model_id);
    info!("{}", rotation.message);
    info!("Worker pool size: {}", config.worker_pool_size);

    let shutdown = GracefulShutdown::new();

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown.clone().signal())
        .await?;

    let dispatch = state.service().dispatch().stats();
    info!(
        completed = dispatch.completed,
        failed = dispatch.failed,
        peak_in_flight = dispatch.peak_in_flight,
        "✅ Graceful shutdown completed"
    );
    Ok(())
}
