mod code;
pub mod health;
pub mod metadata;

use axum::{Router, routing::get};

use crate::AppState;

/// Build FHIR routes
pub fn fhir_routes() -> Router<AppState> {
    Router::new()
        .route("/code", get(code::search).post(code::create))
        .route("/code/{name}/{value}", get(code::read).patch(code::patch))
        .route("/CodeSystem/$lookup", get(code::lookup))
}
