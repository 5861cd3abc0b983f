use http::StatusCode;
use thiserror::Error;

/// Terminology server error types
#[derive(Debug, Error)]
pub enum FhirError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid resource: {0}")]
    Invalid(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unsupported media type: {0}")]
    Unsupported(String),

    #[error("Not acceptable: {0}")]
    NotAcceptable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FhirError {
    /// Transport status code for this error
    pub fn status(&self) -> StatusCode {
        match self {
            FhirError::NotFound(_) => StatusCode::NOT_FOUND,
            FhirError::Invalid(_) => StatusCode::BAD_REQUEST,
            FhirError::Conflict(_) => StatusCode::CONFLICT,
            FhirError::Unsupported(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            FhirError::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            FhirError::Database(_) | FhirError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<serde_json::Error> for FhirError {
    fn from(err: serde_json::Error) -> Self {
        FhirError::Invalid(err.to_string())
    }
}
