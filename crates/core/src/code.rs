//! Cacheable code entries
//!
//! A `CodeEntry` is a (code system, value) pair with an optional integer
//! form, a display label and, optionally, a whole serialized resource stored
//! as raw bytes. Equality and hashing follow the surrogate id only; use
//! [`CodeEntry::same_fields`] to compare content.

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

use fhir_sdk::r4b::resources::Resource;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

use crate::error::FhirError;

/// Placeholder printed for absent fields
const ABSENT: &str = "-";

/// Surrogate identity of a persisted code entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodeId(i64);

impl CodeId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for CodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a duplicated entry keeps the source id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPolicy {
    /// Keep the id; the copy stands in for the original (update flows)
    Preserve,
    /// Drop the id; the copy is inserted as a new entry
    Reset,
}

/// A coded terminology entry
#[derive(Debug, Clone, Default)]
pub struct CodeEntry {
    id: Option<CodeId>,
    /// Code system / category discriminator
    pub code_name: Option<String>,
    pub value: Option<String>,
    pub int_value: Option<i32>,
    pub description: Option<String>,
    /// Serialized resource, stored byte-for-byte
    resource_contents: Option<Vec<u8>>,
}

impl CodeEntry {
    /// Create an unsaved entry
    pub fn new(code_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            code_name: Some(code_name.into()),
            value: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn with_int_value(mut self, int_value: i32) -> Self {
        self.int_value = Some(int_value);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_resource_contents_text(mut self, text: &str) -> Self {
        self.set_resource_contents_text(Some(text));
        self
    }

    pub fn id(&self) -> Option<CodeId> {
        self.id
    }

    /// Attach the id generated on insert. Ids never change once assigned.
    pub fn assign_id(mut self, id: CodeId) -> Result<Self, FhirError> {
        match self.id {
            Some(existing) if existing != id => Err(FhirError::Conflict(format!(
                "code entry already has id {}",
                existing
            ))),
            _ => {
                self.id = Some(id);
                Ok(self)
            }
        }
    }

    /// (codeName, value) lookup key, when both halves are present
    pub fn key(&self) -> Option<(&str, &str)> {
        Some((self.code_name.as_deref()?, self.value.as_deref()?))
    }

    pub fn resource_contents(&self) -> Option<&[u8]> {
        self.resource_contents.as_deref()
    }

    /// Store raw payload bytes. An empty payload is stored as absent.
    pub fn set_resource_contents(&mut self, bytes: Option<Vec<u8>>) {
        self.resource_contents = bytes.filter(|b| !b.is_empty());
    }

    /// Payload decoded as UTF-8. Malformed sequences become U+FFFD.
    pub fn resource_contents_text(&self) -> Option<Cow<'_, str>> {
        self.resource_contents
            .as_deref()
            .map(String::from_utf8_lossy)
    }

    /// Store `text` as UTF-8 bytes; `None` or `""` clears the payload.
    pub fn set_resource_contents_text(&mut self, text: Option<&str>) {
        self.resource_contents = text
            .filter(|t| !t.is_empty())
            .map(|t| t.as_bytes().to_vec());
    }

    /// Payload parsed as JSON
    pub fn resource_json(&self) -> Result<Option<JsonValue>, FhirError> {
        match self.resource_contents.as_deref() {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }

    /// Payload parsed as a typed R4B resource
    pub fn typed_resource(&self) -> Result<Option<Resource>, FhirError> {
        match self.resource_contents.as_deref() {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }

    /// Detached copy with its own payload allocation
    pub fn duplicate(&self, policy: IdPolicy) -> Self {
        let mut copy = self.clone();
        if policy == IdPolicy::Reset {
            copy.id = None;
        }
        copy
    }

    /// Field-by-field comparison, ignoring the id
    pub fn same_fields(&self, other: &CodeEntry) -> bool {
        self.code_name == other.code_name
            && self.value == other.value
            && self.int_value == other.int_value
            && self.description == other.description
            && self.resource_contents == other.resource_contents
    }

    /// Render as the output `Parameters` of a `CodeSystem/$lookup`
    pub fn to_parameters(&self) -> JsonValue {
        let mut parameter = Vec::new();

        if let Some(ref name) = self.code_name {
            parameter.push(json!({ "name": "name", "valueString": name }));
        }
        if let Some(ref value) = self.value {
            parameter.push(json!({ "name": "code", "valueCode": value }));
        }
        if let Some(ref description) = self.description {
            parameter.push(json!({ "name": "display", "valueString": description }));
        }
        if let Some(int_value) = self.int_value {
            parameter.push(json!({
                "name": "property",
                "part": [
                    { "name": "code", "valueCode": "intValue" },
                    { "name": "value", "valueInteger": int_value }
                ]
            }));
        }

        json!({ "resourceType": "Parameters", "parameter": parameter })
    }
}

impl PartialEq for CodeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CodeEntry {}

impl Hash for CodeEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for CodeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let int_value = self
            .int_value
            .map(|v| v.to_string())
            .unwrap_or_else(|| ABSENT.to_string());

        write!(
            f,
            "{}|{}|{}|{}",
            self.code_name.as_deref().unwrap_or(ABSENT),
            self.value.as_deref().unwrap_or(ABSENT),
            int_value,
            self.description.as_deref().unwrap_or(ABSENT),
        )
    }
}
