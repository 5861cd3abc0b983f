//! Code entry HTTP handlers

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
};
use fhir_term_core::{
    Bundle, BundleEntry, CodeEntry, ContentType, IdPolicy, OperationResult, PatchFormat,
    content_type,
};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::AppState;
use crate::error::AppError;
use crate::response::{AcceptFormat, FhirResponse};

/// Query parameters for code search
#[derive(Debug, Deserialize, Default)]
pub struct SearchParams {
    pub name: Option<String>,
}

/// Query parameters for `CodeSystem/$lookup`
#[derive(Debug, Deserialize, Default)]
pub struct LookupParams {
    pub system: Option<String>,
    pub code: Option<String>,
}

/// Request body for creating a code entry
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCodeRequest {
    pub code_name: String,
    pub value: String,
    pub int_value: Option<i32>,
    pub description: Option<String>,
    /// Serialized resource kept with the code, stored verbatim
    pub resource: Option<JsonValue>,
}

impl CreateCodeRequest {
    fn into_entry(self) -> Result<CodeEntry, AppError> {
        let mut entry = CodeEntry::new(self.code_name, self.value);
        entry.int_value = self.int_value;
        entry.description = self.description;

        if let Some(resource) = self.resource {
            let text = serde_json::to_string(&resource)
                .map_err(|e| AppError::BadRequest(format!("Invalid resource: {}", e)))?;
            entry.set_resource_contents_text(Some(&text));
        }
        Ok(entry)
    }
}

/// Read URL of an entry. Code systems are often named by URL, so both
/// segments are percent-encoded.
fn entry_url(base_url: &str, entry: &CodeEntry) -> Option<String> {
    entry.key().map(|(name, value)| {
        format!(
            "{}/code/{}/{}",
            base_url,
            urlencoding::encode(name),
            urlencoding::encode(value)
        )
    })
}

/// Whether a FHIR-typed body is a `Parameters` resource, the carrier of a
/// FHIRPath Patch
fn body_is_parameters(media_type: Option<ContentType>, body: &[u8]) -> bool {
    match media_type {
        Some(ContentType::FhirJson) => serde_json::from_slice::<JsonValue>(body)
            .map(|doc| doc.get("resourceType") == Some(&JsonValue::from("Parameters")))
            .unwrap_or(false),
        Some(ContentType::FhirXml) => {
            let text = String::from_utf8_lossy(body);
            // First element, skipping the prolog and comments
            text.split('<')
                .skip(1)
                .find(|tag| !tag.starts_with('?') && !tag.starts_with('!'))
                .and_then(|tag| tag.strip_prefix("Parameters"))
                .is_some_and(|rest| {
                    rest.starts_with(|c: char| c.is_whitespace() || c == '>' || c == '/')
                })
        }
        _ => false,
    }
}

/// GET /fhir/code - Search code entries, optionally by code system name
pub async fn search(
    State(state): State<AppState>,
    AcceptFormat(format): AcceptFormat,
    Query(params): Query<SearchParams>,
) -> Result<FhirResponse, AppError> {
    let matches = match params.name.as_deref() {
        Some(name) => state.codes.by_code_name(name),
        None => state.codes.all(),
    };

    let entries: Vec<BundleEntry> = matches
        .iter()
        .map(|entry| BundleEntry::new(entry_url(&state.base_url, entry), entry.to_parameters()))
        .collect();

    let self_link = match params.name.as_deref() {
        Some(name) => format!(
            "{}/code?{}={}",
            state.base_url,
            content_type::PARAM_NAME,
            urlencoding::encode(name)
        ),
        None => format!("{}/code", state.base_url),
    };
    let bundle = Bundle::searchset(entries.len() as u32, entries).with_link("self", self_link);

    Ok(FhirResponse::new(OperationResult::bundle(bundle), format))
}

/// GET /fhir/code/{name}/{value} - Read a code entry
///
/// Returns the stored resource when the entry carries one, otherwise the
/// `$lookup` rendering of the entry itself. Payloads that are not JSON
/// cannot be rendered and fall back to the `$lookup` rendering too.
pub async fn read(
    State(state): State<AppState>,
    AcceptFormat(format): AcceptFormat,
    Path((name, value)): Path<(String, String)>,
) -> Result<FhirResponse, AppError> {
    let entry = state
        .codes
        .lookup(&name, &value)
        .ok_or_else(|| AppError::NotFound(format!("Code {}|{} not found", name, value)))?;

    let resource = match entry.resource_json() {
        Ok(Some(resource)) => resource,
        Ok(None) => entry.to_parameters(),
        Err(e) => {
            tracing::warn!(code = %entry, error = %e, "Stored resource is not JSON");
            entry.to_parameters()
        }
    };

    Ok(FhirResponse::new(
        OperationResult::resource(StatusCode::OK, resource),
        format,
    ))
}

/// GET /fhir/CodeSystem/$lookup - Look up a code in a code system
pub async fn lookup(
    State(state): State<AppState>,
    AcceptFormat(format): AcceptFormat,
    Query(params): Query<LookupParams>,
) -> Result<FhirResponse, AppError> {
    let (Some(system), Some(code)) = (params.system, params.code) else {
        return Err(AppError::BadRequest(
            "Both 'system' and 'code' parameters are required".to_string(),
        ));
    };

    let entry = state
        .codes
        .lookup(&system, &code)
        .ok_or_else(|| AppError::NotFound(format!("Code {}|{} not found", system, code)))?;

    Ok(FhirResponse::new(
        OperationResult::resource(StatusCode::OK, entry.to_parameters()),
        format,
    ))
}

/// POST /fhir/code - Create a new code entry
pub async fn create(
    State(state): State<AppState>,
    AcceptFormat(format): AcceptFormat,
    Json(body): Json<CreateCodeRequest>,
) -> Result<FhirResponse, AppError> {
    let mut entry = body.into_entry()?;

    if let Some((name, value)) = entry.key() {
        if state.codes.lookup(name, value).is_some() {
            return Err(AppError::Conflict(format!("Code {}|{} already exists", name, value)));
        }
    }

    let mut persisted = None;
    if let Some(ref repo) = state.repo {
        let id = repo.insert(&entry).await?;
        entry = entry.assign_id(id)?;
        persisted = Some((repo, id));
    }

    let stored = match state.codes.insert(entry) {
        Ok(stored) => stored,
        Err(e) => {
            // Keep the table in step with the cache.
            if let Some((repo, id)) = persisted {
                if let Err(cleanup) = repo.delete(id).await {
                    tracing::error!(code_id = %id, error = ?cleanup, "Failed to roll back code insert");
                }
            }
            return Err(e.into());
        }
    };

    tracing::info!(code = %stored, "Code entry created");

    let location = entry_url(&state.base_url, &stored).unwrap_or_default();
    Ok(FhirResponse::new(
        OperationResult::resource(StatusCode::CREATED, stored.to_parameters()),
        format,
    )
    .with_header(header::LOCATION, &location))
}

/// PATCH /fhir/code/{name}/{value} - Patch the resource stored with a code
///
/// Accepts RFC 6902 JSON Patch documents. The patched document must still
/// parse as a FHIR resource. A patch built from an entry that another writer
/// has replaced in the meantime is rejected with 409.
pub async fn patch(
    State(state): State<AppState>,
    AcceptFormat(format): AcceptFormat,
    Path((name, value)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<FhirResponse, AppError> {
    let media_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(content_type::JSON_PATCH);

    let is_parameters = body_is_parameters(ContentType::parse(media_type), &body);
    match PatchFormat::detect(media_type, is_parameters) {
        Some(PatchFormat::JsonPatch) => {}
        Some(other) => {
            return Err(AppError::UnsupportedMediaType(format!(
                "Patch format {:?} ({}) is not supported",
                other,
                other.content_type()
            )));
        }
        None => {
            return Err(AppError::UnsupportedMediaType(format!(
                "'{}' is not a patch content type",
                media_type
            )));
        }
    }

    let operations: json_patch::Patch = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON Patch: {}", e)))?;

    let current = state
        .codes
        .lookup(&name, &value)
        .ok_or_else(|| AppError::NotFound(format!("Code {}|{} not found", name, value)))?;

    let mut resource = current
        .resource_json()
        .map_err(|e| {
            AppError::Conflict(format!("Code {}|{} stored resource is not JSON: {}", name, value, e))
        })?
        .ok_or_else(|| {
            AppError::Conflict(format!("Code {}|{} has no stored resource to patch", name, value))
        })?;

    json_patch::patch(&mut resource, &operations)
        .map_err(|e| AppError::BadRequest(format!("Failed to apply JSON Patch: {}", e)))?;

    let text = serde_json::to_string(&resource)
        .map_err(|e| AppError::Internal(format!("Failed to serialize patched resource: {}", e)))?;
    let mut draft = current.duplicate(IdPolicy::Preserve);
    draft.set_resource_contents_text(Some(&text));
    draft.typed_resource()?;

    if let Some(ref repo) = state.repo {
        if !repo.update(&current, &draft).await? {
            return Err(AppError::Conflict(format!(
                "Code {}|{} was modified concurrently",
                name, value
            )));
        }
    }
    state.codes.replace_if_current(&current, draft)?;

    tracing::info!(code_name = %name, value = %value, "Code resource patched");

    Ok(FhirResponse::new(
        OperationResult::resource(StatusCode::OK, resource),
        format,
    ))
}
