use crate::configs::AppConfig;
use crate::crypto_provider::ToolVersion;
use crate::csr_service::{CsrService, GenerationResult, VerificationResult};
use crate::error::{AppError, ValidationError};
use crate::sanitizer::{SubjectRequest, DEFAULT_KEY_SIZE};
use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// `keySize` arrives as a string from HTML forms and as a number from
/// scripted clients.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawKeySize {
    Text(String),
    Number(serde_json::Number),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct GenerateCsrRequest {
    common_name: Option<String>,
    organization: Option<String>,
    organizational_unit: Option<String>,
    city: Option<String>,
    state: Option<String>,
    country: Option<String>,
    email: Option<String>,
    key_size: Option<RawKeySize>,
}

impl From<GenerateCsrRequest> for SubjectRequest {
    fn from(body: GenerateCsrRequest) -> Self {
        let key_size = match body.key_size {
            Some(RawKeySize::Text(text)) => text,
            Some(RawKeySize::Number(number)) => number.to_string(),
            None => DEFAULT_KEY_SIZE.to_string(),
        };
        SubjectRequest {
            common_name: body.common_name.unwrap_or_default(),
            organization: body.organization.unwrap_or_default(),
            organizational_unit: body.organizational_unit.unwrap_or_default(),
            city: body.city.unwrap_or_default(),
            state: body.state.unwrap_or_default(),
            country: body.country.unwrap_or_default(),
            email: body.email.unwrap_or_default(),
            key_size,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VerifyCsrRequest {
    csr: Option<String>,
}

pub fn create_router(service: Arc<CsrService>) -> Router {
    Router::new()
        .route("/api/generate-csr", post(generate_csr))
        .route("/api/verify-csr", post(verify_csr))
        .route("/api/ssl-version", get(ssl_version))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

pub fn start_webserver(config: AppConfig, service: CsrService) -> Result<()> {
    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    rt.block_on(serve(config, Arc::new(service)))
}

async fn serve(config: AppConfig, service: Arc<CsrService>) -> Result<()> {
    let ip: IpAddr = config
        .server
        .host
        .parse()
        .context(format!("Invalid server host: {}", config.server.host))?;
    let addr = SocketAddr::new(ip, config.server.port);

    tracing::info!(
        provider = service.provider_name(),
        output_dir = %service.output_dir().display(),
        "CSR workbench ready"
    );

    let app = create_router(service);
    let handle = Handle::new();
    tokio::spawn(shutdown_on_ctrl_c(handle.clone()));

    match (&config.server.tls_cert_path, &config.server.tls_key_path) {
        (Some(cert), Some(key)) => {
            let tls = RustlsConfig::from_pem_file(cert, key)
                .await
                .context(format!(
                    "Failed to load TLS certificate {} / key {}",
                    cert.display(),
                    key.display()
                ))?;
            tracing::info!(%addr, "HTTPS server listening");
            axum_server::bind_rustls(addr, tls)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .context("HTTPS server failed")?;
        }
        _ => {
            tracing::info!(%addr, "HTTP server listening");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .context("HTTP server failed")?;
        }
    }

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_on_ctrl_c(handle: Handle) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutdown requested");
        handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
    }
}

fn reject_body(rejection: JsonRejection) -> AppError {
    tracing::debug!(error = %rejection, "unreadable request body");
    ValidationError::MalformedBody.into()
}

async fn generate_csr(
    State(service): State<Arc<CsrService>>,
    payload: Result<Json<GenerateCsrRequest>, JsonRejection>,
) -> Result<Json<GenerationResult>, AppError> {
    let Json(body) = payload.map_err(reject_body)?;
    let result = service.generate(body.into()).await?;
    Ok(Json(result))
}

async fn verify_csr(
    State(service): State<Arc<CsrService>>,
    payload: Result<Json<VerifyCsrRequest>, JsonRejection>,
) -> Result<Json<VerificationResult>, AppError> {
    let Json(body) = payload.map_err(reject_body)?;
    let result = service.verify(&body.csr.unwrap_or_default()).await?;
    Ok(Json(result))
}

async fn ssl_version(State(service): State<Arc<CsrService>>) -> Json<ToolVersion> {
    Json(service.tool_version().await)
}
