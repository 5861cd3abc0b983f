use serde::{Deserialize, Serialize};

use crate::content_type::{FHIR_JSON, JSON, PatchFormat, READ};

/// FHIR CapabilityStatement resource (simplified)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityStatement {
    pub resource_type: String,
    pub status: String,
    pub date: String,
    pub kind: String,
    pub fhir_version: String,
    pub format: Vec<String>,
    pub patch_format: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementation: Option<CapabilityImplementation>,
    pub rest: Vec<CapabilityRest>,
}

impl CapabilityStatement {
    /// Create a default capability statement for this server
    pub fn new() -> Self {
        Self {
            resource_type: "CapabilityStatement".to_string(),
            status: "active".to_string(),
            date: chrono::Utc::now().format("%Y-%m-%d").to_string(),
            kind: "instance".to_string(),
            fhir_version: "4.3.0".to_string(), // R4B
            format: vec![FHIR_JSON.to_string(), JSON.to_string()],
            patch_format: PatchFormat::advertised(),
            implementation: None,
            rest: vec![CapabilityRest::default()],
        }
    }

    /// Statement describing the server instance rooted at `base_url`
    pub fn for_instance(base_url: &str) -> Self {
        Self {
            implementation: Some(CapabilityImplementation {
                description: "FHIR terminology code server".to_string(),
                url: base_url.to_string(),
            }),
            ..Self::new()
        }
    }
}

impl Default for CapabilityStatement {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityImplementation {
    pub description: String,
    pub url: String,
}

/// REST capability declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityRest {
    pub mode: String,
    pub resource: Vec<CapabilityResource>,
}

impl Default for CapabilityRest {
    fn default() -> Self {
        Self {
            mode: "server".to_string(),
            resource: vec![CapabilityResource::code_system()],
        }
    }
}

/// Per-resource capability declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub interaction: Vec<CapabilityInteraction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub search_param: Vec<CapabilitySearchParam>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operation: Vec<CapabilityOperation>,
}

impl CapabilityResource {
    pub fn code_system() -> Self {
        Self {
            resource_type: "CodeSystem".to_string(),
            interaction: [READ, "search-type", "create", "patch"]
                .into_iter()
                .map(|code| CapabilityInteraction {
                    code: code.to_string(),
                })
                .collect(),
            search_param: vec![CapabilitySearchParam {
                name: crate::content_type::PARAM_NAME.to_string(),
                param_type: "string".to_string(),
            }],
            operation: vec![CapabilityOperation {
                name: "lookup".to_string(),
                definition: "http://hl7.org/fhir/OperationDefinition/CodeSystem-lookup"
                    .to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityInteraction {
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitySearchParam {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityOperation {
    pub name: String,
    pub definition: String,
}
