//! Crypto Provider Interface
//!
//! The service never generates keys or parses ASN.1 itself. Both jobs are
//! delegated to a [`CryptoProvider`]:
//!
//! - [`OpensslNativeProvider`](crate::native_provider::OpensslNativeProvider)
//!   links against OpenSSL through the `openssl` crate. No subprocess, no
//!   command line, no temporary files.
//! - [`OpensslCliProvider`](crate::cli_provider::OpensslCliProvider) drives
//!   the `openssl` binary with a bounded timeout, staging inputs in uniquely
//!   named temporary files.
//!
//! Errors returned by a provider may contain raw tool diagnostics. Callers log
//! them and must not forward them to clients.

use crate::subject::Subject;
use anyhow::Result;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::fmt;

#[async_trait]
pub trait CryptoProvider: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Generate an RSA key of `key_size_bits` and a CSR for `subject` signed
    /// with it.
    async fn generate_key_and_csr(
        &self,
        subject: &Subject,
        key_size_bits: u32,
    ) -> Result<GeneratedKeyPair>;

    /// Check that the CSR's signature validates against its own public key
    /// and return a human readable report.
    async fn verify_csr_self_consistency(&self, csr_pem: &str) -> Result<String>;

    /// Full OpenSSL version line, e.g. `OpenSSL 3.0.13 30 Jan 2024`.
    async fn tool_version(&self) -> Result<String>;
}

/// PEM encoded output of a generation.
pub struct GeneratedKeyPair {
    pub private_key_pem: SecretString,
    pub csr_pem: String,
}

impl GeneratedKeyPair {
    pub fn new(private_key_pem: String, csr_pem: String) -> Self {
        Self {
            private_key_pem: SecretString::from(private_key_pem),
            csr_pem,
        }
    }

    pub fn private_key_pem(&self) -> &str {
        self.private_key_pem.expose_secret()
    }
}

impl fmt::Debug for GeneratedKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedKeyPair")
            .field("private_key_pem", &"<redacted>")
            .field("csr_pem", &self.csr_pem)
            .finish()
    }
}

/// Body of `GET /api/ssl-version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolVersion {
    pub version: String,
    pub full_version: String,
    pub status: String,
}

impl ToolVersion {
    /// Parse a line such as `OpenSSL 3.1.4 24 Oct 2023`. The version is the
    /// second whitespace separated token.
    pub fn from_version_line(line: &str) -> Self {
        let full_version = line.trim().to_string();
        let version = full_version
            .split_whitespace()
            .nth(1)
            .unwrap_or("unknown")
            .to_string();
        Self {
            version,
            full_version,
            status: "installed".to_string(),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            version: "error".to_string(),
            full_version: "unavailable".to_string(),
            status: "error".to_string(),
        }
    }
}
