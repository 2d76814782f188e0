use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rust_consulta_api::config::Config;
use rust_consulta_api::dispatcher::SourceDispatcher;
use rust_consulta_api::handlers::{self, AppState};

/// Main entry point for the application.
///
/// Initializes tracing, loads configuration, wires the three lookup sources
/// behind the dispatcher, starts the idle-window purge task and serves the
/// HTTP routes.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_consulta_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let dispatcher = SourceDispatcher::from_config(&config)?;
    tracing::info!(
        "✓ Lookup sources ready (registry: {}, person: {}, portal: {})",
        config.cnpj_api_base_url,
        config.external_api_base_url,
        config.crea_url
    );

    // Drop caller windows that went idle so the map does not grow unbounded
    let limiter = dispatcher.rate_limiter().clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(limiter.window());
        interval.tick().await;
        loop {
            interval.tick().await;
            let purged = limiter.purge_idle(Instant::now());
            if purged > 0 {
                tracing::debug!(
                    "Purged {} idle rate windows ({} still tracked)",
                    purged,
                    limiter.tracked_callers()
                );
            }
        }
    });

    let app = handlers::router(Arc::new(AppState { dispatcher }));

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
