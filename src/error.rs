//! Error Taxonomy
//!
//! Leaf modules return [`ValidationError`] or [`PathError`]. Everything that
//! reaches an HTTP handler is converted into [`AppError`], whose response body
//! only ever carries a fixed, user-facing message. Provider diagnostics are
//! logged and then dropped.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Input problems detected before any cryptographic work runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Common Name (CN) is required")]
    MissingCommonName,

    #[error("Invalid key size. Allowed values are 2048, 3072 and 4096")]
    InvalidKeySize,

    #[error("CSR content is required")]
    MissingCsr,

    #[error("Invalid CSR format. Expected a PEM encoded certificate request")]
    InvalidCsrFormat,

    #[error("Request body must be a JSON object")]
    MalformedBody,
}

/// Output path derivation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("derived path {0:?} escapes the output directory")]
    Escapes(PathBuf),

    #[error("output directory {0:?} is not usable")]
    InvalidOutputDir(PathBuf),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("unsafe output path: {0}")]
    UnsafePath(#[from] PathError),

    /// `message` is what the caller sees; `source` stays server-side.
    #[error("{message}: {source:#}")]
    CryptoToolFailure {
        message: &'static str,
        source: anyhow::Error,
    },

    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

pub const UNSAFE_PATH_MESSAGE: &str = "Unable to derive a safe output path";
pub const INTERNAL_MESSAGE: &str = "Internal server error";

impl AppError {
    pub fn crypto(message: &'static str, source: anyhow::Error) -> Self {
        AppError::CryptoToolFailure { message, source }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::UnsafePath(PathError::Escapes(_)) => {
                StatusCode::BAD_REQUEST
            }
            AppError::UnsafePath(PathError::InvalidOutputDir(_))
            | AppError::CryptoToolFailure { .. }
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The only text about this error that may leave the process.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(e) => e.to_string(),
            AppError::UnsafePath(PathError::Escapes(_)) => UNSAFE_PATH_MESSAGE.to_string(),
            AppError::UnsafePath(PathError::InvalidOutputDir(_)) => INTERNAL_MESSAGE.to_string(),
            AppError::CryptoToolFailure { message, .. } => message.to_string(),
            AppError::Internal(_) => INTERNAL_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            AppError::Validation(e) => tracing::info!(error = %e, "rejected request"),
            AppError::UnsafePath(e @ PathError::Escapes(_)) => {
                tracing::warn!(error = %e, "rejected unsafe output path")
            }
            other => tracing::error!(error = %other, "request failed"),
        }

        let body = Json(json!({
            "success": false,
            "error": self.public_message(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T, E = AppError> = core::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::from(ValidationError::InvalidKeySize).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(PathError::Escapes(PathBuf::from("/etc/passwd"))).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::crypto("CSR generation failed", anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::from(anyhow!("disk full")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_public_message_hides_diagnostics() {
        let err = AppError::crypto(
            "CSR generation failed",
            anyhow!("/usr/lib/ssl/openssl.cnf: error:0E06D06C:configuration file routines"),
        );
        assert_eq!(err.public_message(), "CSR generation failed");
        // Display keeps the diagnostic for server-side logs.
        assert!(err.to_string().contains("openssl.cnf"));

        let err = AppError::from(PathError::Escapes(PathBuf::from("/etc/passwd")));
        assert!(!err.public_message().contains("/etc"));
    }

    #[test]
    fn test_missing_output_dir_is_a_server_fault() {
        let err = AppError::from(PathError::InvalidOutputDir(PathBuf::from("/srv/output")));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), INTERNAL_MESSAGE);
    }
}
