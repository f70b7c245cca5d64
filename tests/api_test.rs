use anyhow::anyhow;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use csr_workbench::cli_provider::OpensslCliProvider;
use csr_workbench::crypto_provider::{CryptoProvider, GeneratedKeyPair};
use csr_workbench::csr_service::CsrService;
use csr_workbench::native_provider::OpensslNativeProvider;
use csr_workbench::sanitizer::Sanitizer;
use csr_workbench::subject::Subject;
use csr_workbench::webserver::create_router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

const LEAKY_DIAGNOSTIC: &str =
    "/etc/ssl/private/ca.key: error:1E08010C:DECODER routines::unsupported\nstack backtrace:";

/// Provider whose every call fails with a tool-style diagnostic.
struct FailingProvider;

#[async_trait]
impl CryptoProvider for FailingProvider {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn generate_key_and_csr(
        &self,
        _subject: &Subject,
        _key_size_bits: u32,
    ) -> anyhow::Result<GeneratedKeyPair> {
        Err(anyhow!(LEAKY_DIAGNOSTIC))
    }

    async fn verify_csr_self_consistency(&self, _csr_pem: &str) -> anyhow::Result<String> {
        Err(anyhow!(LEAKY_DIAGNOSTIC))
    }

    async fn tool_version(&self) -> anyhow::Result<String> {
        Err(anyhow!(LEAKY_DIAGNOSTIC))
    }
}

fn app_with(dir: &TempDir, provider: Arc<dyn CryptoProvider>) -> Router {
    let service = CsrService::new(Sanitizer::default(), dir.path(), provider).unwrap();
    create_router(Arc::new(service))
}

fn app(dir: &TempDir) -> Router {
    app_with(dir, Arc::new(OpensslNativeProvider::new()))
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    post_raw(app, uri, body.to_string()).await
}

async fn post_raw(app: &Router, uri: &str, body: String) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn file_count(dir: &TempDir) -> usize {
    std::fs::read_dir(dir.path()).unwrap().count()
}

#[tokio::test]
async fn generate_then_verify_wildcard() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);

    let (status, body) = post_json(
        &app,
        "/api/generate-csr",
        json!({
            "commonName": "*.example.com",
            "organization": "Example Corp",
            "organizationalUnit": "IT",
            "city": "Springfield",
            "state": "Illinois",
            "country": "us",
            "email": "admin@example.com",
            "keySize": "2048"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["success"], true);
    let key_filename = body["key_filename"].as_str().unwrap();
    let csr_filename = body["csr_filename"].as_str().unwrap();
    assert!(key_filename.starts_with("wildcard_example_com_"));
    assert!(key_filename.ends_with(".key"));
    assert!(csr_filename.ends_with(".csr"));
    assert!(body["private_key"].as_str().unwrap().contains("PRIVATE KEY"));
    assert!(body["verification"].as_str().unwrap().contains("verify OK"));

    let csr = body["csr"].as_str().unwrap();
    assert_eq!(
        std::fs::read_to_string(dir.path().join(csr_filename)).unwrap(),
        csr
    );

    let (status, verified) = post_json(&app, "/api/verify-csr", json!({ "csr": csr })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["success"], true);
    let report = verified["verification"].as_str().unwrap();
    assert!(report.contains("CN = *.example.com"));
    assert!(report.contains("C = US"));
}

#[tokio::test]
async fn numeric_key_size_is_accepted() {
    let dir = TempDir::new().unwrap();
    let (status, body) = post_json(
        &app(&dir),
        "/api/generate-csr",
        json!({ "commonName": "numeric.example", "keySize": 2048 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
}

#[tokio::test]
async fn malformed_country_is_left_out() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);

    for country in ["U_", "@1", "*A"] {
        let (status, body) = post_json(
            &app,
            "/api/generate-csr",
            json!({ "commonName": "test.com", "country": country, "keySize": "2048" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{} -> {}", country, body);
        let report = body["verification"].as_str().unwrap();
        assert!(report.contains("CN = test.com"));
        assert!(!report.contains("C = "), "{} kept in {}", country, report);
    }
}

#[tokio::test]
async fn generate_validation_errors() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);

    let (status, body) = post_json(&app, "/api/generate-csr", json!({ "keySize": "2048" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Common Name (CN) is required");
    assert_eq!(body["success"], false);

    let (status, body) =
        post_json(&app, "/api/generate-csr", json!({ "commonName": "<>;|" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Common Name (CN) is required");

    let bad_sizes = [
        json!("1024"),
        json!("abc"),
        json!("-2048"),
        json!(""),
        json!("2048 -out /etc/x"),
    ];
    for key_size in bad_sizes {
        let (status, body) = post_json(
            &app,
            "/api/generate-csr",
            json!({ "commonName": "example.com", "keySize": key_size }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", key_size);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid key size"));
    }

    let (status, body) = post_raw(&app, "/api/generate-csr", "{not json".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Request body must be a JSON object");

    assert_eq!(file_count(&dir), 0);
}

#[tokio::test]
async fn traversal_in_common_name_stays_in_output_dir() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);

    let (status, body) = post_json(
        &app,
        "/api/generate-csr",
        json!({ "commonName": "../../../../tmp/evil", "keySize": "2048" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let key_filename = body["key_filename"].as_str().unwrap();
    assert!(!key_filename.contains('/'));
    assert!(dir.path().join(key_filename).is_file());
    assert_eq!(file_count(&dir), 2);
}

#[tokio::test]
async fn verify_validation_errors() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);

    let (status, body) = post_json(&app, "/api/verify-csr", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "CSR content is required");

    let (status, body) = post_json(&app, "/api/verify-csr", json!({ "csr": "not a csr" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid CSR format"));

    let (status, body) = post_json(
        &app,
        "/api/verify-csr",
        json!({
            "csr": "-----BEGIN CERTIFICATE REQUEST-----\nZm9v\n-----END CERTIFICATE REQUEST-----\n"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "CSR verification failed");
}

#[tokio::test]
async fn provider_diagnostics_never_reach_clients() {
    let dir = TempDir::new().unwrap();
    let app = app_with(&dir, Arc::new(FailingProvider));

    let (status, body) = post_json(
        &app,
        "/api/generate-csr",
        json!({ "commonName": "example.com", "keySize": "4096" }),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let text = body.to_string();
    assert!(!text.contains("/etc/ssl"));
    assert!(!text.contains("DECODER"));
    assert!(!text.contains("backtrace"));
    assert_eq!(body["error"], "Failed to generate private key and CSR");

    let (status, body) = post_json(
        &app,
        "/api/verify-csr",
        json!({ "csr": "-----BEGIN CERTIFICATE REQUEST-----\n" }),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body.to_string().contains("DECODER"));

    let request = Request::builder()
        .uri("/api/ssl-version")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "version": "error", "full_version": "unavailable", "status": "error" })
    );
}

#[tokio::test]
async fn ssl_version_reports_openssl() {
    let dir = TempDir::new().unwrap();
    let request = Request::builder()
        .uri("/api/ssl-version")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app(&dir), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "installed");
    let full = body["full_version"].as_str().unwrap();
    assert_eq!(
        body["version"].as_str().unwrap(),
        full.split_whitespace().nth(1).unwrap_or("unknown")
    );
}

async fn assert_concurrent_verifies(app: &Router, output: &TempDir) {
    let mut csrs = Vec::new();
    for cn in ["alpha.example", "bravo.example", "charlie.example", "delta.example"] {
        let (status, body) = post_json(
            app,
            "/api/generate-csr",
            json!({ "commonName": cn, "keySize": "2048" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        csrs.push((cn, body["csr"].as_str().unwrap().to_string()));
    }
    // One key and one CSR per request, no staged leftovers
    assert_eq!(file_count(output), 8);

    let tasks: Vec<_> = csrs
        .into_iter()
        .cycle()
        .take(16)
        .map(|(cn, csr)| {
            let app = app.clone();
            tokio::spawn(async move {
                let (status, body) =
                    post_json(&app, "/api/verify-csr", json!({ "csr": csr })).await;
                (cn, status, body)
            })
        })
        .collect();

    for task in tasks {
        let (cn, status, body) = task.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        let report = body["verification"].as_str().unwrap();
        assert!(report.contains(&format!("CN = {}", cn)), "{} got {}", cn, report);
    }

    // Verification leaves nothing behind in the output directory
    assert_eq!(file_count(output), 8);
}

#[tokio::test]
async fn concurrent_verifies_do_not_interfere() {
    let dir = TempDir::new().unwrap();
    assert_concurrent_verifies(&app(&dir), &dir).await;
}

#[tokio::test]
async fn concurrent_verifies_through_openssl_binary() {
    let installed = std::process::Command::new("openssl")
        .arg("version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false);
    if !installed {
        eprintln!("openssl not on PATH, skipping");
        return;
    }

    // Staged inputs share the output directory, as in the default deployment
    let dir = TempDir::new().unwrap();
    let provider = OpensslCliProvider::new("openssl", dir.path(), Duration::from_secs(30));
    assert_concurrent_verifies(&app_with(&dir, Arc::new(provider)), &dir).await;
}
