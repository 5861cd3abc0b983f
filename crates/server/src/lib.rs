//! fhir-term-server library crate
//!
//! Exposes `build_app`, `AppState` and `config` for integration tests.
//! The actual binary entrypoint is in `main.rs`.

pub mod config;
pub mod db;
mod error;
mod middleware;
mod response;
mod routes;

use std::sync::Arc;

use axum::{Router, middleware as axum_mw, routing::get};
use fhir_term_core::CodeStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use db::CodeRepository;

pub use error::AppError;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub codes: Arc<CodeStore>,
    /// Write-through persistence; `None` in cache-only mode
    pub repo: Option<CodeRepository>,
    pub base_url: Arc<str>,
}

impl AppState {
    pub fn new(codes: Arc<CodeStore>, repo: Option<CodeRepository>, base_url: &str) -> Self {
        Self {
            codes,
            repo,
            base_url: Arc::from(base_url),
        }
    }
}

/// Build the full application router with all routes and middleware.
///
/// Extracted from `main()` so integration tests can construct the app
/// without binding to a TCP port.
pub fn build_app(state: AppState, config: &Config) -> Router {
    // Build CORS layer
    let cors = if config.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/metadata", get(routes::metadata::get))
        .route("/health", get(routes::health::check))
        .nest("/fhir", routes::fhir_routes())
        .with_state(state)
        .layer(axum_mw::from_fn(middleware::request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Seed the code cache from the database
pub async fn load_codes(repo: &CodeRepository, codes: &CodeStore) -> Result<usize, AppError> {
    repo.ensure_schema().await?;
    let entries = repo.load_all().await?;
    Ok(codes.load(entries)?)
}
