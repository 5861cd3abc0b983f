//! Rendering of operation results and response content negotiation

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use fhir_term_core::{ContentType, OperationResult, content_type};

use crate::error::AppError;

/// Response content type negotiated from the `Accept` header.
///
/// Only JSON renderings can be produced; anything else is rejected with
/// 406 Not Acceptable.
#[derive(Debug, Clone, Copy)]
pub struct AcceptFormat(pub ContentType);

/// Renderings the server can produce
pub const PRODUCIBLE: [ContentType; 2] = [ContentType::FhirJson, ContentType::Json];

impl<S> FromRequestParts<S> for AcceptFormat
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let accept = parts
            .headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok());

        match content_type::negotiate(accept, &PRODUCIBLE) {
            Some(ct) => Ok(AcceptFormat(ct)),
            None => Err(AppError::NotAcceptable(format!(
                "Cannot produce any of '{}'; supported: {}, {}",
                accept.unwrap_or(content_type::EMPTY),
                content_type::FHIR_JSON,
                content_type::JSON
            ))),
        }
    }
}

/// An `OperationResult` bound to the content type it is rendered as
pub struct FhirResponse {
    result: OperationResult,
    format: ContentType,
    headers: HeaderMap,
}

impl FhirResponse {
    pub fn new(result: OperationResult, format: ContentType) -> Self {
        Self {
            result,
            format,
            headers: HeaderMap::new(),
        }
    }

    /// Add a response header; values that are not valid header text are dropped
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(e) => tracing::warn!(header = %name, error = %e, "Dropping invalid header value"),
        }
        self
    }
}

impl IntoResponse for FhirResponse {
    fn into_response(self) -> Response {
        let body = match self.result.to_json().and_then(|json| serde_json::to_vec(&json)) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize operation result");
                return (StatusCode::INTERNAL_SERVER_ERROR, "serialization failure").into_response();
            }
        };

        let mut headers = self.headers;
        if let Ok(value) = HeaderValue::from_str(&self.format.header_value()) {
            headers.insert(header::CONTENT_TYPE, value);
        }

        (self.result.status(), headers, body).into_response()
    }
}
