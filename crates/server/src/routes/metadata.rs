//! Metadata endpoint handler

use axum::extract::State;
use fhir_term_core::{CapabilityStatement, OperationResult};

use crate::AppState;
use crate::response::{AcceptFormat, FhirResponse};

/// GET /metadata - Return server capability statement
pub async fn get(State(state): State<AppState>, AcceptFormat(format): AcceptFormat) -> FhirResponse {
    let statement = CapabilityStatement::for_instance(&state.base_url);
    FhirResponse::new(OperationResult::conformance(statement), format)
}
