//! CSR Request Orchestration
//!
//! Glues the sanitizer, subject builder, path deriver, envelope validator and
//! crypto provider together into the two operations exposed over HTTP.
//!
//! # Generate
//! ```text
//! CN present? ─► key size allowed? ─► sanitize ─► CN still present? ─► build subject
//!     ─► derive paths ─► provider.generate ─► write .key/.csr ─► provider.verify ─► result
//! ```
//!
//! # Verify
//! ```text
//! CSR present? ─► PEM envelope ─► provider.verify ─► result
//! ```
//!
//! Any failing step short-circuits with an [`AppError`]. Files already written
//! by a generation whose self-check fails are left on disk.

use crate::crypto_provider::{CryptoProvider, ToolVersion};
use crate::error::{AppError, Result, ValidationError};
use crate::paths::{derive_paths, resolve_output_dir};
use crate::pem::validate_csr_envelope;
use crate::sanitizer::{validate_key_size, Sanitizer, SubjectRequest};
use crate::subject::build_subject;
use anyhow::Context;
use chrono::{Local, NaiveDateTime};
use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

const GENERATION_FAILED: &str = "Failed to generate private key and CSR";
const SELF_CHECK_FAILED: &str = "Generated CSR failed verification";
const VERIFICATION_FAILED: &str = "CSR verification failed";

/// Body of a successful `POST /api/generate-csr`.
#[derive(Debug, Serialize)]
pub struct GenerationResult {
    pub success: bool,
    pub csr: String,
    #[serde(serialize_with = "serialize_secret")]
    pub private_key: SecretString,
    pub key_filename: String,
    pub csr_filename: String,
    pub verification: String,
}

/// Body of a successful `POST /api/verify-csr`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub success: bool,
    pub verification: String,
}

fn serialize_secret<S: Serializer>(
    secret: &SecretString,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

pub struct CsrService {
    sanitizer: Sanitizer,
    output_dir: PathBuf,
    provider: Arc<dyn CryptoProvider>,
}

impl CsrService {
    /// Create the service, creating `output_dir` if needed.
    ///
    /// # Arguments
    /// * `sanitizer` - Sanitizer carrying the configured character policy
    /// * `output_dir` - Directory receiving generated artifacts
    /// * `provider` - Crypto provider doing the actual key and CSR work
    pub fn new(
        sanitizer: Sanitizer,
        output_dir: &Path,
        provider: Arc<dyn CryptoProvider>,
    ) -> anyhow::Result<Self> {
        std::fs::create_dir_all(output_dir).with_context(|| {
            format!("Failed to create output directory {}", output_dir.display())
        })?;
        let output_dir = resolve_output_dir(output_dir)?;

        Ok(Self {
            sanitizer,
            output_dir,
            provider,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub async fn generate(&self, request: SubjectRequest) -> Result<GenerationResult> {
        self.generate_at(request, Local::now().naive_local()).await
    }

    /// Generate with an explicit timestamp for the artifact names.
    pub async fn generate_at(
        &self,
        request: SubjectRequest,
        timestamp: NaiveDateTime,
    ) -> Result<GenerationResult> {
        if request.common_name.trim().is_empty() {
            return Err(ValidationError::MissingCommonName.into());
        }
        let key_size = validate_key_size(&request.key_size)?;

        let fields = self.sanitizer.sanitize_request(&request);
        if fields.common_name.as_str().trim().is_empty() {
            return Err(ValidationError::MissingCommonName.into());
        }
        let subject = build_subject(&fields)?;
        let paths = derive_paths(&fields.common_name, timestamp, &self.output_dir)?;

        let pair = self
            .provider
            .generate_key_and_csr(&subject, key_size)
            .await
            .map_err(|e| AppError::crypto(GENERATION_FAILED, e))?;

        write_artifact(&paths.key_path, pair.private_key_pem().as_bytes(), true).await?;
        write_artifact(&paths.csr_path, pair.csr_pem.as_bytes(), false).await?;

        let verification = self
            .provider
            .verify_csr_self_consistency(&pair.csr_pem)
            .await
            .map_err(|e| AppError::crypto(SELF_CHECK_FAILED, e))?;

        tracing::info!(
            subject = %subject,
            key_size,
            key_file = %paths.key_filename(),
            csr_file = %paths.csr_filename(),
            "generated key and CSR"
        );

        Ok(GenerationResult {
            success: true,
            csr: pair.csr_pem,
            private_key: pair.private_key_pem,
            key_filename: paths.key_filename(),
            csr_filename: paths.csr_filename(),
            verification,
        })
    }

    pub async fn verify(&self, csr: &str) -> Result<VerificationResult> {
        if csr.trim().is_empty() {
            return Err(ValidationError::MissingCsr.into());
        }
        validate_csr_envelope(csr)?;

        let verification = self
            .provider
            .verify_csr_self_consistency(csr)
            .await
            .map_err(|e| AppError::crypto(VERIFICATION_FAILED, e))?;

        tracing::info!(bytes = csr.len(), "verified submitted CSR");

        Ok(VerificationResult {
            success: true,
            verification,
        })
    }

    /// Never fails; a broken provider reports `status: "error"`.
    pub async fn tool_version(&self) -> ToolVersion {
        match self.provider.tool_version().await {
            Ok(line) => ToolVersion::from_version_line(&line),
            Err(e) => {
                tracing::error!(error = %format!("{:#}", e), "failed to query OpenSSL version");
                ToolVersion::unavailable()
            }
        }
    }
}

async fn write_artifact(path: &Path, contents: &[u8], private: bool) -> Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    if private {
        options.mode(0o600);
    }
    #[cfg(not(unix))]
    let _ = private;

    let mut file = options
        .open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.write_all(contents)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    file.flush()
        .await
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(())
}
