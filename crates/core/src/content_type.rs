//! Content negotiation registry
//!
//! Recognized MIME types, patch document formats and protocol-reserved
//! parameter names. Values never change after startup; match them by value,
//! not by reference.

/// Interaction verb for reading the current version of a resource
pub const READ: &str = "read";
/// Interaction verb for reading a specific version of a resource
pub const VREAD: &str = "vread";

pub const DEFAULT_ROOT_URL: &str = "http://localhost:8080/fhir";

/// Suffix appended to a media type on outgoing `Content-Type` headers
pub const CHARSET_UTF8: &str = "; charset=utf-8";

pub const GRAPHQL: &str = "application/graphql";
pub const JSON: &str = "application/json";
pub const XML: &str = "application/xml";
pub const FHIR_JSON: &str = "application/fhir+json";
pub const FHIR_XML: &str = "application/fhir+xml";
pub const JSON_PATCH: &str = "application/json-patch+json";
pub const XML_PATCH: &str = "application/xml-patch+xml";

// The protocol patch variants travel under the same media types as the
// generic patch documents.
pub const FHIR_JSON_PATCH: &str = "application/json-patch+json";
pub const FHIR_XML_PATCH: &str = "application/xml-patch+xml";

// Reserved query/field names
pub const PARAM_ID: &str = "_id";
pub const PARAM_ACTIVE: &str = "active";
pub const PARAM_ADDRESS: &str = "address";
pub const PARAM_GIVEN: &str = "given";
pub const PARAM_NAME: &str = "name";

pub const EMPTY: &str = "";

/// Media types exposed at the transport boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Graphql,
    Json,
    Xml,
    FhirJson,
    FhirXml,
    JsonPatch,
    XmlPatch,
}

impl ContentType {
    pub const ALL: [ContentType; 7] = [
        ContentType::Graphql,
        ContentType::Json,
        ContentType::Xml,
        ContentType::FhirJson,
        ContentType::FhirXml,
        ContentType::JsonPatch,
        ContentType::XmlPatch,
    ];

    /// Bare media type, without parameters
    pub fn mime_type(&self) -> &'static str {
        match self {
            ContentType::Graphql => GRAPHQL,
            ContentType::Json => JSON,
            ContentType::Xml => XML,
            ContentType::FhirJson => FHIR_JSON,
            ContentType::FhirXml => FHIR_XML,
            ContentType::JsonPatch => JSON_PATCH,
            ContentType::XmlPatch => XML_PATCH,
        }
    }

    /// Full `Content-Type` header value with the utf-8 charset parameter
    pub fn header_value(&self) -> String {
        format!("{}{}", self.mime_type(), CHARSET_UTF8)
    }

    /// Parse a media type, ignoring parameters such as `charset` and case.
    pub fn parse(value: &str) -> Option<Self> {
        let base = base_type(value);
        Self::ALL
            .into_iter()
            .find(|ct| ct.mime_type().eq_ignore_ascii_case(base))
    }

    pub fn is_fhir(&self) -> bool {
        matches!(self, ContentType::FhirJson | ContentType::FhirXml)
    }

    pub fn is_json(&self) -> bool {
        matches!(
            self,
            ContentType::Json | ContentType::FhirJson | ContentType::JsonPatch
        )
    }

    pub fn is_patch(&self) -> bool {
        matches!(self, ContentType::JsonPatch | ContentType::XmlPatch)
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Media type with parameters stripped and surrounding whitespace trimmed.
fn base_type(value: &str) -> &str {
    value.split(';').next().unwrap_or(EMPTY).trim()
}

/// Base-type equality: `application/fhir+json` and
/// `application/fhir+json; charset=utf-8` name the same content type.
pub fn same_media_type(a: &str, b: &str) -> bool {
    base_type(a).eq_ignore_ascii_case(base_type(b))
}

/// Pick the response content type for an `Accept` header from the types the
/// caller can produce.
///
/// Entries are tried in the order listed (quality values other than `q=0`
/// are not ranked) and ranges naming a type outside `producible` are
/// skipped. Wildcards and a missing header resolve to `application/fhir+json`
/// when producible, otherwise to the first producible type. Returns `None`
/// when no listed type can be produced.
pub fn negotiate(accept: Option<&str>, producible: &[ContentType]) -> Option<ContentType> {
    let preferred = if producible.contains(&ContentType::FhirJson) {
        Some(ContentType::FhirJson)
    } else {
        producible.first().copied()
    };

    let Some(accept) = accept.filter(|a| !a.trim().is_empty()) else {
        return preferred;
    };

    for media_range in accept.split(',') {
        if is_excluded(media_range) {
            continue;
        }

        match base_type(media_range) {
            "*/*" | "application/*" => return preferred,
            base => {
                if let Some(ct) = ContentType::parse(base).filter(|ct| producible.contains(ct)) {
                    return Some(ct);
                }
            }
        }
    }

    None
}

/// `q=0` marks a media range as not acceptable
fn is_excluded(media_range: &str) -> bool {
    media_range.split(';').skip(1).any(|param| {
        let mut kv = param.splitn(2, '=').map(str::trim);
        match (kv.next(), kv.next()) {
            (Some(k), Some(v)) if k.eq_ignore_ascii_case("q") => {
                v.parse::<f32>().map(|q| q <= 0.0).unwrap_or(false)
            }
            _ => false,
        }
    })
}

/// Partial-update document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchFormat {
    /// RFC 6902 JSON Patch
    JsonPatch,
    /// RFC 5261 XML Patch
    XmlPatch,
    /// FHIRPath Patch carried in a JSON `Parameters` resource
    FhirJsonPatch,
    /// FHIRPath Patch carried in an XML `Parameters` resource
    FhirXmlPatch,
}

impl PatchFormat {
    /// Media type the patch document is sent with
    pub fn content_type(&self) -> ContentType {
        match self {
            PatchFormat::JsonPatch => ContentType::JsonPatch,
            PatchFormat::XmlPatch => ContentType::XmlPatch,
            PatchFormat::FhirJsonPatch => ContentType::FhirJson,
            PatchFormat::FhirXmlPatch => ContentType::FhirXml,
        }
    }

    /// Patch formats the server applies, as advertised in the capability
    /// statement
    pub fn advertised() -> Vec<String> {
        vec![PatchFormat::JsonPatch.content_type().mime_type().to_string()]
    }

    /// Identify the patch format of a request body.
    ///
    /// FHIR media types only denote a patch when the body is a `Parameters`
    /// resource.
    pub fn detect(content_type: &str, body_is_parameters: bool) -> Option<Self> {
        match ContentType::parse(content_type)? {
            ContentType::JsonPatch => Some(PatchFormat::JsonPatch),
            ContentType::XmlPatch => Some(PatchFormat::XmlPatch),
            ContentType::FhirJson if body_is_parameters => Some(PatchFormat::FhirJsonPatch),
            ContentType::FhirXml if body_is_parameters => Some(PatchFormat::FhirXmlPatch),
            _ => None,
        }
    }
}
