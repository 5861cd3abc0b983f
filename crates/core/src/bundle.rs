use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// FHIR Bundle types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BundleType {
    Searchset,
    History,
    Collection,
}

/// FHIR Bundle resource (simplified for search responses)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub resource_type: String,

    #[serde(rename = "type")]
    pub bundle_type: BundleType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link: Vec<BundleLink>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<BundleEntry>,
}

impl Bundle {
    fn new(bundle_type: BundleType, total: Option<u32>, entry: Vec<BundleEntry>) -> Self {
        Self {
            resource_type: "Bundle".to_string(),
            bundle_type,
            total,
            link: Vec::new(),
            entry,
        }
    }

    /// Search result bundle; `total` is the number of matches
    pub fn searchset(total: u32, entry: Vec<BundleEntry>) -> Self {
        Self::new(BundleType::Searchset, Some(total), entry)
    }

    pub fn collection(entry: Vec<BundleEntry>) -> Self {
        Self::new(BundleType::Collection, None, entry)
    }

    pub fn with_link(mut self, relation: &str, url: impl Into<String>) -> Self {
        self.link.push(BundleLink {
            relation: relation.to_string(),
            url: url.into(),
        });
        self
    }
}

/// Bundle navigation link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleLink {
    pub relation: String,
    pub url: String,
}

/// Bundle entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,

    pub resource: JsonValue,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<BundleEntrySearch>,
}

impl BundleEntry {
    pub fn new(full_url: Option<String>, resource: JsonValue) -> Self {
        Self {
            full_url,
            resource,
            search: Some(BundleEntrySearch {
                mode: "match".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleEntrySearch {
    pub mode: String,
}
