//! Operation result envelope
//!
//! Every dispatch operation hands the transport an `OperationResult`: one
//! payload shape (or none, for error-only results) plus a status code and
//! an optional diagnostic message.

use http::StatusCode;
use serde_json::Value as JsonValue;

use crate::bundle::Bundle;
use crate::capability::CapabilityStatement;
use crate::content_type::{READ, VREAD};
use crate::error::FhirError;
use crate::outcome::OperationOutcome;

/// Broad outcome class of a status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeClass {
    Informational,
    Success,
    Redirection,
    ClientError,
    ServerError,
}

impl From<StatusCode> for OutcomeClass {
    fn from(status: StatusCode) -> Self {
        if status.is_server_error() {
            OutcomeClass::ServerError
        } else if status.is_client_error() {
            OutcomeClass::ClientError
        } else if status.is_redirection() {
            OutcomeClass::Redirection
        } else if status.is_informational() {
            OutcomeClass::Informational
        } else {
            OutcomeClass::Success
        }
    }
}

/// Which payload a result carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    Conformance,
    Resource,
    Bundle,
    ErrorOnly,
}

/// Borrowed view of a result's payload
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    Resource(&'a JsonValue),
    Bundle(&'a Bundle),
    Conformance(&'a CapabilityStatement),
}

#[derive(Debug, Clone)]
pub enum OperationResult {
    Conformance {
        status: StatusCode,
        statement: CapabilityStatement,
        message: Option<String>,
    },
    Resource {
        status: StatusCode,
        resource: JsonValue,
        message: Option<String>,
    },
    Bundle {
        status: StatusCode,
        bundle: Bundle,
        message: Option<String>,
    },
    ErrorOnly {
        status: StatusCode,
        message: String,
    },
}

impl OperationResult {
    pub fn conformance(statement: CapabilityStatement) -> Self {
        OperationResult::Conformance {
            status: StatusCode::OK,
            statement,
            message: None,
        }
    }

    pub fn resource(status: StatusCode, resource: JsonValue) -> Self {
        OperationResult::Resource {
            status,
            resource,
            message: None,
        }
    }

    pub fn bundle(bundle: Bundle) -> Self {
        OperationResult::Bundle {
            status: StatusCode::OK,
            bundle,
            message: None,
        }
    }

    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        OperationResult::ErrorOnly {
            status,
            message: message.into(),
        }
    }

    /// Attach or replace the diagnostic message
    pub fn with_message(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        match &mut self {
            OperationResult::Conformance { message, .. }
            | OperationResult::Resource { message, .. }
            | OperationResult::Bundle { message, .. } => *message = Some(text),
            OperationResult::ErrorOnly { message, .. } => *message = text,
        }
        self
    }

    pub fn status(&self) -> StatusCode {
        match self {
            OperationResult::Conformance { status, .. }
            | OperationResult::Resource { status, .. }
            | OperationResult::Bundle { status, .. }
            | OperationResult::ErrorOnly { status, .. } => *status,
        }
    }

    pub fn outcome(&self) -> OutcomeClass {
        self.status().into()
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            OperationResult::Conformance { message, .. }
            | OperationResult::Resource { message, .. }
            | OperationResult::Bundle { message, .. } => message.as_deref(),
            OperationResult::ErrorOnly { message, .. } => Some(message),
        }
    }

    pub fn resource_body(&self) -> Option<&JsonValue> {
        match self {
            OperationResult::Resource { resource, .. } => Some(resource),
            _ => None,
        }
    }

    pub fn bundle_body(&self) -> Option<&Bundle> {
        match self {
            OperationResult::Bundle { bundle, .. } => Some(bundle),
            _ => None,
        }
    }

    pub fn conformance_body(&self) -> Option<&CapabilityStatement> {
        match self {
            OperationResult::Conformance { statement, .. } => Some(statement),
            _ => None,
        }
    }

    /// The populated payload, checked in resource, bundle, conformance order
    pub fn payload(&self) -> Option<Payload<'_>> {
        self.resource_body()
            .map(Payload::Resource)
            .or_else(|| self.bundle_body().map(Payload::Bundle))
            .or_else(|| self.conformance_body().map(Payload::Conformance))
    }

    pub fn shape(&self) -> ResultShape {
        match self {
            OperationResult::Conformance { .. } => ResultShape::Conformance,
            OperationResult::Resource { .. } => ResultShape::Resource,
            OperationResult::Bundle { .. } => ResultShape::Bundle,
            OperationResult::ErrorOnly { .. } => ResultShape::ErrorOnly,
        }
    }

    /// Response body: the payload, or an OperationOutcome built from the
    /// status and message when there is none
    pub fn to_json(&self) -> Result<JsonValue, serde_json::Error> {
        match self {
            OperationResult::Conformance { statement, .. } => serde_json::to_value(statement),
            OperationResult::Resource { resource, .. } => Ok(resource.clone()),
            OperationResult::Bundle { bundle, .. } => serde_json::to_value(bundle),
            OperationResult::ErrorOnly { status, message } => {
                serde_json::to_value(OperationOutcome::for_status(*status, message))
            }
        }
    }
}

impl From<FhirError> for OperationResult {
    fn from(err: FhirError) -> Self {
        OperationResult::error(err.status(), err.to_string())
    }
}

/// Dispatch operations and the payload shape each one returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Vread,
    Search,
    Patch,
    Create,
    Capabilities,
}

impl Operation {
    /// Operation named by an interaction verb
    pub fn from_verb(verb: &str) -> Option<Self> {
        match verb {
            READ => Some(Operation::Read),
            VREAD => Some(Operation::Vread),
            "search-type" | "search" => Some(Operation::Search),
            "patch" => Some(Operation::Patch),
            "create" => Some(Operation::Create),
            "capabilities" => Some(Operation::Capabilities),
            _ => None,
        }
    }

    pub fn shape(&self) -> ResultShape {
        match self {
            Operation::Read | Operation::Vread | Operation::Patch | Operation::Create => {
                ResultShape::Resource
            }
            Operation::Search => ResultShape::Bundle,
            Operation::Capabilities => ResultShape::Conformance,
        }
    }

    /// Whether `result` is a valid answer to this operation. An error-only
    /// result answers any operation.
    pub fn fits(&self, result: &OperationResult) -> bool {
        let shape = result.shape();
        shape == ResultShape::ErrorOnly || shape == self.shape()
    }
}
