//! CSR Workbench - Certificate Signing Request Service Library
//!
//! Turns untrusted form input into an RSA private key plus a PKCS#10
//! certificate signing request, and checks submitted CSRs for internal
//! consistency. The cryptography itself is delegated to OpenSSL through a
//! [`crypto_provider::CryptoProvider`]; this crate owns the input handling
//! around it.
//!
//! # Pipeline
//!
//! ```text
//! form fields ─► sanitizer ─► subject + paths ─► CryptoProvider::generate ─► key + CSR
//! CSR text    ─► pem envelope ─────────────────► CryptoProvider::verify   ─► report
//! ```
//!
//! # HTTP API
//!
//! | Method | Path | Body |
//! |---|---|---|
//! | POST | `/api/generate-csr` | `{commonName, organization, organizationalUnit, city, state, country, email, keySize}` |
//! | POST | `/api/verify-csr` | `{csr}` |
//! | GET | `/api/ssl-version` | - |
//!
//! # Module Overview
//!
//! - [`sanitizer`]: character filtering, length ceilings, key size allow-list
//! - [`subject`]: fixed-order distinguished name builder
//! - [`paths`]: artifact filenames and output directory containment
//! - [`pem`]: PEM envelope check for submitted CSRs
//! - [`crypto_provider`]: provider trait, implemented by [`native_provider`] and [`cli_provider`]
//! - [`csr_service`]: generate / verify orchestration
//! - [`error`]: error taxonomy and HTTP mapping
//! - [`configs`]: TOML configuration with environment overrides
//! - [`webserver`]: axum router and server startup
//!
//! # Example
//!
//! ```no_run
//! use csr_workbench::csr_service::CsrService;
//! use csr_workbench::native_provider::OpensslNativeProvider;
//! use csr_workbench::sanitizer::{Sanitizer, SubjectRequest};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let service = CsrService::new(
//!     Sanitizer::default(),
//!     Path::new("./output"),
//!     Arc::new(OpensslNativeProvider::new()),
//! )?;
//!
//! let result = service
//!     .generate(SubjectRequest {
//!         common_name: "*.example.com".to_string(),
//!         key_size: "2048".to_string(),
//!         ..SubjectRequest::default()
//!     })
//!     .await?;
//! println!("wrote {} and {}", result.key_filename, result.csr_filename);
//! # Ok(())
//! # }
//! ```

pub mod cli_provider;
pub mod configs;
pub mod crypto_provider;
pub mod csr_service;
pub mod error;
pub mod native_provider;
pub mod paths;
pub mod pem;
pub mod sanitizer;
pub mod subject;
pub mod webserver;
