//! fhir-term-server: terminology code server binary entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fhir_term_core::CodeStore;
use fhir_term_server::{AppState, config::Config, db::CodeRepository};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Load configuration
    let config = Config::from_env();
    let codes = Arc::new(CodeStore::new());

    // Connect and seed the cache, or run cache-only
    let repo = match config.database_url {
        Some(ref url) => {
            let pool = fhir_term_server::db::create_pool(url)
                .await
                .expect("Failed to create database pool");
            let repo = CodeRepository::new(pool);
            let loaded = fhir_term_server::load_codes(&repo, &codes)
                .await
                .expect("Failed to load code entries");
            tracing::info!(count = loaded, "Code entries loaded from database");
            Some(repo)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, running in cache-only mode");
            None
        }
    };

    // Build application
    let state = AppState::new(codes, repo, &config.base_url);
    let app = fhir_term_server::build_app(state, &config);

    // Start server
    let addr: SocketAddr = config.bind_address.parse().expect("Invalid bind address");
    tracing::info!("Starting terminology server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server shutdown complete");
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    use tokio::signal;

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
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
