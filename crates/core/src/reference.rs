use serde::{Deserialize, Serialize};

/// Association between a resource field and the target it refers to.
///
/// Label, key and value are always present; the data type, structural
/// path and referenced resource type are filled in as the walker learns
/// them, in any combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabeledReference {
    pub label: String,
    pub key: String,
    pub value: String,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_type: Option<String>,
}

impl LabeledReference {
    pub fn new(label: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            key: key.into(),
            value: value.into(),
            data_type: None,
            path: None,
            ref_type: None,
        }
    }

    pub fn with_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_ref_type(mut self, ref_type: impl Into<String>) -> Self {
        self.ref_type = Some(ref_type.into());
        self
    }

    /// True when the value points at another resource
    pub fn is_reference(&self) -> bool {
        self.ref_type.is_some()
    }
}
