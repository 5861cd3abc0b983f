//! Integration tests for the terminology code server.
//!
//! These tests drive the Axum router directly in cache-only mode (no
//! database), seeding the code store in memory.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use fhir_term_core::{CodeEntry, CodeStore};
use http_body_util::BodyExt;
use serde_json::Value as JsonValue;
use tower::ServiceExt;

use fhir_term_server::{AppState, config::Config};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const BASE_URL: &str = "http://test.local/fhir";

const MARITAL_STATUS: &str =
    r#"{"resourceType":"ValueSet","name":"MaritalStatus","status":"active"}"#;

fn seed(codes: &CodeStore) {
    codes
        .insert(
            CodeEntry::new("priority", "routine")
                .with_int_value(3)
                .with_description("Routine"),
        )
        .unwrap();
    codes
        .insert(
            CodeEntry::new("priority", "stat")
                .with_int_value(1)
                .with_description("Immediately"),
        )
        .unwrap();
    codes
        .insert(
            CodeEntry::new("valueset", "marital-status")
                .with_description("Marital status codes")
                .with_resource_contents_text(MARITAL_STATUS),
        )
        .unwrap();
}

/// Build the app router with a seeded in-memory store.
fn test_app() -> (Router, Arc<CodeStore>) {
    let config = Config {
        database_url: None,
        bind_address: "0.0.0.0:0".to_string(),
        base_url: BASE_URL.to_string(),
        cors_origins: vec!["*".to_string()],
    };

    let codes = Arc::new(CodeStore::new());
    seed(&codes);

    let state = AppState::new(codes.clone(), None, &config.base_url);
    (fhir_term_server::build_app(state, &config), codes)
}

/// Send a request to the app and return (status, content type, body as JSON).
async fn request(app: &Router, req: Request<Body>) -> (StatusCode, Option<String>, JsonValue) {
    let response = app.clone().oneshot(req).await.expect("Request failed");
    let status = response.status();
    let content_type = response
        .headers()
        .get("Content-Type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();

    let body = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
    };

    (status, content_type, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn get_accept(uri: &str, accept: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("Accept", accept)
        .body(Body::empty())
        .unwrap()
}

fn post(uri: &str, body: JsonValue) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn patch(uri: &str, content_type: &str, body: JsonValue) -> Request<Body> {
    Request::builder()
        .method("PATCH")
        .uri(uri)
        .header("Content-Type", content_type)
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn patch_text(uri: &str, content_type: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("PATCH")
        .uri(uri)
        .header("Content-Type", content_type)
        .body(Body::from(body.to_string()))
        .unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_metadata() {
    let (app, _) = test_app();

    let (status, content_type, body) = request(&app, get("/metadata")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        content_type.as_deref(),
        Some("application/fhir+json; charset=utf-8")
    );
    assert_eq!(body["resourceType"], "CapabilityStatement");
    assert_eq!(body["fhirVersion"], "4.3.0");
    assert_eq!(body["status"], "active");
    assert_eq!(body["patchFormat"][0], "application/json-patch+json");
    assert_eq!(body["implementation"]["url"], BASE_URL);
}

#[tokio::test]
async fn test_metadata_plain_json() {
    let (app, _) = test_app();

    let (status, content_type, body) =
        request(&app, get_accept("/metadata", "application/json")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json; charset=utf-8"));
    assert_eq!(body["resourceType"], "CapabilityStatement");
}

#[tokio::test]
async fn test_xml_only_accept_is_not_acceptable() {
    let (app, _) = test_app();

    let (status, _, body) =
        request(&app, get_accept("/metadata", "application/fhir+xml")).await;

    assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
    assert_eq!(body["resourceType"], "OperationOutcome");
    assert_eq!(body["issue"][0]["code"], "not-supported");
}

#[tokio::test]
async fn test_mixed_accept_picks_producible_type() {
    let (app, _) = test_app();

    let (status, content_type, body) = request(
        &app,
        get_accept("/metadata", "application/fhir+xml, application/fhir+json"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        content_type.as_deref(),
        Some("application/fhir+json; charset=utf-8")
    );
    assert_eq!(body["resourceType"], "CapabilityStatement");

    let (status, content_type, _) = request(
        &app,
        get_accept("/fhir/code/priority/stat", "application/xml, application/json"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json; charset=utf-8"));
}

#[tokio::test]
async fn test_health() {
    let (app, _) = test_app();

    let (status, _, body) = request(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["codes"], 3);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let (app, _) = test_app();

    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .header("X-Request-ID", "abc-123")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.headers()["X-Request-ID"], "abc-123");

    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert!(response.headers().contains_key("X-Request-ID"));
}

#[tokio::test]
async fn test_search_by_name() {
    let (app, _) = test_app();

    let (status, _, body) = request(&app, get("/fhir/code?name=priority")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resourceType"], "Bundle");
    assert_eq!(body["type"], "searchset");
    assert_eq!(body["total"], 2);

    // Ordered by intValue
    let entries = body["entry"].as_array().unwrap();
    assert_eq!(entries[0]["resource"]["parameter"][1]["valueCode"], "stat");
    assert_eq!(entries[1]["resource"]["parameter"][1]["valueCode"], "routine");
    assert_eq!(
        entries[0]["fullUrl"],
        format!("{}/code/priority/stat", BASE_URL)
    );
}

#[tokio::test]
async fn test_search_without_name_returns_all() {
    let (app, _) = test_app();

    let (status, _, body) = request(&app, get("/fhir/code")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
}

#[tokio::test]
async fn test_search_no_matches() {
    let (app, _) = test_app();

    let (status, _, body) = request(&app, get("/fhir/code?name=unknown")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
    assert!(body.get("entry").is_none());
}

#[tokio::test]
async fn test_read_returns_stored_resource() {
    let (app, _) = test_app();

    let (status, _, body) = request(&app, get("/fhir/code/valueset/marital-status")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resourceType"], "ValueSet");
    assert_eq!(body["name"], "MaritalStatus");
}

#[tokio::test]
async fn test_read_without_resource_returns_parameters() {
    let (app, _) = test_app();

    let (status, _, body) = request(&app, get("/fhir/code/priority/stat")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resourceType"], "Parameters");
    assert_eq!(body["parameter"][2]["valueString"], "Immediately");
}

#[tokio::test]
async fn test_read_is_exact_match() {
    let (app, _) = test_app();

    let (status, _, body) = request(&app, get("/fhir/code/priority/STAT")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["resourceType"], "OperationOutcome");
    assert_eq!(body["issue"][0]["code"], "not-found");
}

#[tokio::test]
async fn test_read_non_json_resource_falls_back_to_parameters() {
    let (app, codes) = test_app();
    codes
        .insert(
            CodeEntry::new("valueset", "legacy")
                .with_description("Legacy XML value set")
                .with_resource_contents_text("<ValueSet xmlns=\"http://hl7.org/fhir\"/>"),
        )
        .unwrap();

    let (status, _, body) = request(&app, get("/fhir/code/valueset/legacy")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resourceType"], "Parameters");
    assert_eq!(body["parameter"][2]["valueString"], "Legacy XML value set");

    // A JSON Patch cannot be applied to it either.
    let (status, _, _) = request(
        &app,
        patch(
            "/fhir/code/valueset/legacy",
            "application/json-patch+json",
            serde_json::json!([{"op": "add", "path": "/status", "value": "active"}]),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_lookup() {
    let (app, _) = test_app();

    let (status, _, body) = request(
        &app,
        get("/fhir/CodeSystem/$lookup?system=priority&code=routine"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resourceType"], "Parameters");
    assert_eq!(body["parameter"][0]["valueString"], "priority");
    assert_eq!(body["parameter"][3]["part"][1]["valueInteger"], 3);
}

#[tokio::test]
async fn test_lookup_requires_both_parameters() {
    let (app, _) = test_app();

    let (status, _, body) = request(&app, get("/fhir/CodeSystem/$lookup?system=priority")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["issue"][0]["code"], "invalid");
}

#[tokio::test]
async fn test_create() {
    let (app, codes) = test_app();

    let response = app
        .clone()
        .oneshot(post(
            "/fhir/code",
            serde_json::json!({
                "codeName": "priority",
                "value": "asap",
                "intValue": 2,
                "description": "As soon as possible"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        response.headers()["Location"],
        format!("{}/code/priority/asap", BASE_URL).as_str()
    );

    let stored = codes.lookup("priority", "asap").expect("entry stored");
    assert_eq!(stored.int_value, Some(2));
    assert!(stored.id().is_some());

    // Slots between stat (1) and routine (3)
    let (_, _, body) = request(&app, get("/fhir/code?name=priority")).await;
    assert_eq!(body["entry"][1]["resource"]["parameter"][1]["valueCode"], "asap");
}

#[tokio::test]
async fn test_create_with_resource() {
    let (app, codes) = test_app();

    let (status, _, _) = request(
        &app,
        post(
            "/fhir/code",
            serde_json::json!({
                "codeName": "valueset",
                "value": "gender",
                "resource": {"resourceType": "ValueSet", "status": "draft"}
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let stored = codes.lookup("valueset", "gender").unwrap();
    assert_eq!(stored.resource_json().unwrap().unwrap()["status"], "draft");
}

#[tokio::test]
async fn test_create_url_named_system_round_trips() {
    let (app, _) = test_app();
    let system = "http://hl7.org/fhir/administrative-gender";

    let response = app
        .clone()
        .oneshot(post(
            "/fhir/code",
            serde_json::json!({"codeName": system, "value": "male", "description": "Male"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let location = response.headers()["Location"].to_str().unwrap().to_string();
    assert_eq!(
        location,
        format!(
            "{}/code/http%3A%2F%2Fhl7.org%2Ffhir%2Fadministrative-gender/male",
            BASE_URL
        )
    );

    let path = location.strip_prefix("http://test.local").unwrap();
    let (status, _, body) = request(&app, get(path)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["parameter"][0]["valueString"], system);
    assert_eq!(body["parameter"][2]["valueString"], "Male");

    let (_, _, body) = request(
        &app,
        get("/fhir/code?name=http%3A%2F%2Fhl7.org%2Ffhir%2Fadministrative-gender"),
    )
    .await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["entry"][0]["fullUrl"], location.as_str());
    assert_eq!(
        body["link"][0]["url"],
        format!(
            "{}/code?name=http%3A%2F%2Fhl7.org%2Ffhir%2Fadministrative-gender",
            BASE_URL
        )
    );
}

#[tokio::test]
async fn test_create_duplicate_conflicts() {
    let (app, _) = test_app();

    let (status, _, body) = request(
        &app,
        post(
            "/fhir/code",
            serde_json::json!({"codeName": "priority", "value": "stat"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["issue"][0]["code"], "conflict");
}

#[tokio::test]
async fn test_json_patch() {
    let (app, codes) = test_app();
    let before = codes.lookup("valueset", "marital-status").unwrap();

    let (status, _, body) = request(
        &app,
        patch(
            "/fhir/code/valueset/marital-status",
            "application/json-patch+json",
            serde_json::json!([{"op": "replace", "path": "/status", "value": "retired"}]),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "retired");

    // The published entry was replaced, not mutated.
    assert_eq!(
        before.resource_contents_text().as_deref(),
        Some(MARITAL_STATUS)
    );
    let after = codes.lookup("valueset", "marital-status").unwrap();
    assert_eq!(after.id(), before.id());
    assert_eq!(after.resource_json().unwrap().unwrap()["status"], "retired");
}

#[tokio::test]
async fn test_patch_rejects_invalid_result() {
    let (app, codes) = test_app();

    let (status, _, _) = request(
        &app,
        patch(
            "/fhir/code/valueset/marital-status",
            "application/json-patch+json",
            serde_json::json!([{"op": "replace", "path": "/resourceType", "value": "NotAResource"}]),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let entry = codes.lookup("valueset", "marital-status").unwrap();
    assert_eq!(entry.resource_contents_text().as_deref(), Some(MARITAL_STATUS));
}

#[tokio::test]
async fn test_patch_unsupported_formats() {
    let (app, _) = test_app();

    let (status, _, _) = request(
        &app,
        patch(
            "/fhir/code/valueset/marital-status",
            "application/fhir+json",
            serde_json::json!({"resourceType": "Parameters", "parameter": []}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let (status, _, _) = request(
        &app,
        patch(
            "/fhir/code/valueset/marital-status",
            "application/json",
            serde_json::json!([]),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_patch_xml_documents_are_unsupported() {
    let (app, codes) = test_app();

    let (status, _, body) = request(
        &app,
        patch_text(
            "/fhir/code/valueset/marital-status",
            "application/xml-patch+xml",
            r#"<diff><replace sel="ValueSet/status/@value">retired</replace></diff>"#,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["resourceType"], "OperationOutcome");

    let (status, _, _) = request(
        &app,
        patch_text(
            "/fhir/code/valueset/marital-status",
            "application/fhir+xml",
            r#"<?xml version="1.0"?><Parameters xmlns="http://hl7.org/fhir"><parameter/></Parameters>"#,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let entry = codes.lookup("valueset", "marital-status").unwrap();
    assert_eq!(entry.resource_contents_text().as_deref(), Some(MARITAL_STATUS));
}

#[tokio::test]
async fn test_patch_without_stored_resource() {
    let (app, _) = test_app();

    let (status, _, _) = request(
        &app,
        patch(
            "/fhir/code/priority/stat",
            "application/json-patch+json",
            serde_json::json!([{"op": "add", "path": "/status", "value": "active"}]),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_patch_unknown_code() {
    let (app, _) = test_app();

    let (status, _, _) = request(
        &app,
        patch(
            "/fhir/code/valueset/unknown",
            "application/json-patch+json",
            serde_json::json!([]),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
