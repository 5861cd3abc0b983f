use http::StatusCode;
use serde::{Deserialize, Serialize};

/// Severity of the issue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Fatal,
    Error,
    Warning,
    Information,
}

/// Type of issue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum IssueType {
    Invalid,
    Structure,
    Required,
    Value,
    Security,
    Forbidden,
    Processing,
    NotSupported,
    Duplicate,
    NotFound,
    CodeInvalid,
    Conflict,
    Exception,
    Throttled,
    Informational,
}

/// A single issue in an OperationOutcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationOutcomeIssue {
    pub severity: IssueSeverity,
    pub code: IssueType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

/// FHIR OperationOutcome resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcome {
    pub resource_type: String,
    pub issue: Vec<OperationOutcomeIssue>,
}

impl OperationOutcome {
    fn single(severity: IssueSeverity, code: IssueType, message: &str) -> Self {
        Self {
            resource_type: "OperationOutcome".to_string(),
            issue: vec![OperationOutcomeIssue {
                severity,
                code,
                diagnostics: Some(message.to_string()),
            }],
        }
    }

    pub fn error(code: IssueType, message: &str) -> Self {
        Self::single(IssueSeverity::Error, code, message)
    }

    pub fn not_found(message: &str) -> Self {
        Self::error(IssueType::NotFound, message)
    }

    pub fn invalid(message: &str) -> Self {
        Self::error(IssueType::Invalid, message)
    }

    pub fn conflict(message: &str) -> Self {
        Self::error(IssueType::Conflict, message)
    }

    pub fn success(message: &str) -> Self {
        Self::single(IssueSeverity::Information, IssueType::Informational, message)
    }

    /// Outcome describing a status-only result
    pub fn for_status(status: StatusCode, message: &str) -> Self {
        if !(status.is_client_error() || status.is_server_error()) {
            return Self::success(message);
        }

        let code = match status.as_u16() {
            400 | 422 => IssueType::Invalid,
            401 => IssueType::Security,
            403 => IssueType::Forbidden,
            404 | 410 => IssueType::NotFound,
            409 | 412 => IssueType::Conflict,
            405 | 406 | 415 | 501 => IssueType::NotSupported,
            429 => IssueType::Throttled,
            500..=599 => IssueType::Exception,
            _ => IssueType::Processing,
        };
        Self::error(code, message)
    }
}
