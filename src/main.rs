use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::signal;

use content_engine::db::{self, PgAuditLogStore, PgConfigStore};
use content_engine::llm::{PricingTable, ProviderRouter};
use content_engine::telemetry::init_telemetry;
use content_engine::{AppState, Config, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let telemetry_guard = init_telemetry(&config)?;

    tracing::info!(
        port = config.port,
        environment = %config.environment,
        "Starting content-engine"
    );

    let pool = db::create_pool(&config).await?;

    let pricing = Arc::new(PricingTable::resolve(config.pricing_json_path.as_deref()));
    tracing::info!(
        version = %pricing.version,
        models = pricing.len(),
        "Pricing table ready"
    );

    let router = ProviderRouter::from_config(&config);
    if router.configured().is_empty() {
        tracing::warn!("No provider API keys configured, every generation will fail");
    }

    let state = AppState::new(
        Arc::new(PgConfigStore::new(pool.clone())),
        Arc::new(PgAuditLogStore::new(pool)),
        Arc::new(router),
        pricing,
    );

    let app = routes::create_router(state, Duration::from_secs(config.request_timeout_secs));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    telemetry_guard.shutdown();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
