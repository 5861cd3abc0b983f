//! fhir-term-core: terminology code entries and operation result types
//!
//! This crate provides the data layer shared by the code server: the
//! content negotiation registry, cached code entries and their store,
//! labeled references, and the result envelope returned by dispatch
//! operations, together with Bundle, OperationOutcome and
//! CapabilityStatement.

pub mod bundle;
pub mod capability;
pub mod code;
pub mod content_type;
pub mod error;
pub mod outcome;
pub mod reference;
pub mod result;
pub mod store;

// Re-export fhir-sdk types
pub use fhir_sdk::r4b::resources::Resource;

// Re-export our types
pub use bundle::{Bundle, BundleEntry, BundleLink, BundleType};
pub use capability::CapabilityStatement;
pub use code::{CodeEntry, CodeId, IdPolicy};
pub use content_type::{ContentType, PatchFormat};
pub use error::FhirError;
pub use outcome::{IssueSeverity, IssueType, OperationOutcome, OperationOutcomeIssue};
pub use reference::LabeledReference;
pub use result::{Operation, OperationResult, OutcomeClass, Payload, ResultShape};
pub use store::CodeStore;
