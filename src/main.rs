//! License Admin - HTTP server entry point

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use license_admin::backend::{DataService, MemoryDataService, RestDataService};
use license_admin::{create_router, AdminService, AppState, Config, SharedCache};

/// Main entry point for the admin server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Connect the data service (remote, or in-memory demo data)
/// 4. Create the process-wide cache and the admin service
/// 5. Start HTTP server on configured port
/// 6. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "license_admin=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting License Admin server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: port={}, data_service={}, page_size={}/{}",
        config.server_port,
        config.data_service_url.as_deref().unwrap_or("in-memory"),
        config.default_page_size,
        config.max_page_size
    );

    let data: Arc<dyn DataService> = match &config.data_service_url {
        Some(url) => Arc::new(
            RestDataService::new(
                url,
                config.data_service_key.as_deref(),
                config.data_service_timeout(),
            )
            .context("failed to build data service client")?,
        ),
        None => {
            warn!("DATA_SERVICE_URL not set, serving in-memory demo data");
            Arc::new(MemoryDataService::with_demo_data().await)
        }
    };

    let service = AdminService::new(data, SharedCache::new())
        .with_page_sizes(config.default_page_size, config.max_page_size);
    let app = create_router(AppState::new(service));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
