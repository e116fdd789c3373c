//! API server mode.

use std::net::SocketAddr;

use tracing::info;

use arcade_orchestrator::PlayerLifecycle;

/// Serve the API until Ctrl-C.
pub async fn run(lifecycle: PlayerLifecycle, port: u16) -> anyhow::Result<()> {
    let router = arcade_api::build_router(lifecycle);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
                return;
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("API server stopped");
    Ok(())
}
