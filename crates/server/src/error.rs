//! Application error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use fhir_term_core::{ContentType, FhirError, OperationResult};
use tokio_postgres::error::SqlState;

use crate::response::FhirResponse;

/// Application error type
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    UnsupportedMediaType(String),
    NotAcceptable(String),
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn into_message(self) -> String {
        match self {
            AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Conflict(msg)
            | AppError::UnsupportedMediaType(msg)
            | AppError::NotAcceptable(msg)
            | AppError::Internal(msg) => msg,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, error = ?self, "Request failed");
        }

        let result = OperationResult::error(status, self.into_message());
        FhirResponse::new(result, ContentType::FhirJson).into_response()
    }
}

impl From<FhirError> for AppError {
    fn from(err: FhirError) -> Self {
        let msg = err.to_string();
        match err {
            FhirError::NotFound(_) => AppError::NotFound(msg),
            FhirError::Invalid(_) => AppError::BadRequest(msg),
            FhirError::Conflict(_) => AppError::Conflict(msg),
            FhirError::Unsupported(_) => AppError::UnsupportedMediaType(msg),
            FhirError::NotAcceptable(_) => AppError::NotAcceptable(msg),
            FhirError::Database(_) | FhirError::Internal(_) => AppError::Internal(msg),
        }
    }
}

impl From<deadpool_postgres::PoolError> for AppError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        AppError::Internal(format!("Database pool error: {}", err))
    }
}

impl From<tokio_postgres::Error> for AppError {
    fn from(err: tokio_postgres::Error) -> Self {
        if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
            let detail = err
                .as_db_error()
                .and_then(|db| db.detail())
                .unwrap_or("duplicate key");
            return AppError::Conflict(format!("Code entry already exists: {}", detail));
        }
        AppError::Internal(format!("Database error: {}", err))
    }
}
