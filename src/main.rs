//! CSR Workbench - certificate request generation service
//!
//! Serves a small JSON API that generates RSA private keys with matching
//! PKCS#10 certificate signing requests and verifies submitted CSRs.
//!
//! # Quick Start
//!
//! ```bash
//! cargo build --release
//! OUTPUT_DIR=/var/lib/csr ./target/release/csr-workbench
//! ```
//!
//! Configuration is read from `$CSR_WORKBENCH_CONFIG` or `config.toml`; see
//! [`csr_workbench::configs`]. Log verbosity follows `RUST_LOG`.

use anyhow::{Context, Result};
use csr_workbench::cli_provider::OpensslCliProvider;
use csr_workbench::configs::{AppConfig, ProviderKind};
use csr_workbench::crypto_provider::CryptoProvider;
use csr_workbench::csr_service::CsrService;
use csr_workbench::native_provider::OpensslNativeProvider;
use csr_workbench::sanitizer::Sanitizer;
use csr_workbench::webserver;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let provider: Arc<dyn CryptoProvider> = match config.crypto.provider {
        ProviderKind::Native => Arc::new(OpensslNativeProvider::new()),
        ProviderKind::Cli => Arc::new(OpensslCliProvider::new(
            config.crypto.openssl_binary.clone(),
            config.output.directory.clone(),
            config.crypto.command_timeout(),
        )),
    };

    let service = CsrService::new(
        Sanitizer::new(config.sanitizer.clone()),
        &config.output.directory,
        provider,
    )
    .context("Failed to initialize CSR service")?;

    webserver::start_webserver(config, service)
}
