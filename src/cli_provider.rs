//! OpenSSL command line provider.
//!
//! Each operation spawns the configured `openssl` binary. Arguments are built
//! from already validated values only: the key size comes from the allow-list
//! and the subject from sanitized fields. Inputs that the tool needs as files
//! are staged with `tempfile` inside the scratch directory under a random name,
//! so overlapping requests never share a file, and the file is removed when
//! the handle drops on any exit path.
//!
//! Every invocation is bounded by `timeout`; a child that overruns it is
//! killed.

use crate::crypto_provider::{CryptoProvider, GeneratedKeyPair};
use crate::paths::{ensure_contained, resolve_output_dir};
use crate::subject::Subject;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct OpensslCliProvider {
    binary: PathBuf,
    scratch_dir: PathBuf,
    timeout: Duration,
}

impl OpensslCliProvider {
    /// # Arguments
    /// * `binary` - Path or name of the `openssl` executable
    /// * `scratch_dir` - Directory for transient input files (usually the output directory)
    /// * `timeout` - Upper bound for a single invocation
    pub fn new(
        binary: impl Into<PathBuf>,
        scratch_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            binary: binary.into(),
            scratch_dir: scratch_dir.into(),
            timeout,
        }
    }

    async fn run<I, S>(&self, args: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| anyhow!("openssl did not finish within {:?}", self.timeout))?
            .with_context(|| format!("Failed to spawn {}", self.binary.display()))?;

        if !output.status.success() {
            bail!(
                "openssl exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(output.stdout)
    }
}

/// Write `contents` to a fresh, uniquely named file directly inside `dir`.
pub(crate) fn stage_file(
    dir: &Path,
    prefix: &str,
    suffix: &str,
    contents: &[u8],
) -> Result<NamedTempFile> {
    let root = resolve_output_dir(dir)?;
    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(suffix)
        .tempfile_in(&root)
        .with_context(|| format!("Failed to create temporary file in {}", root.display()))?;
    ensure_contained(&root, file.path())?;
    file.write_all(contents)
        .context("Failed to write temporary file")?;
    file.flush().context("Failed to flush temporary file")?;
    Ok(file)
}

#[async_trait]
impl CryptoProvider for OpensslCliProvider {
    fn name(&self) -> &'static str {
        "openssl-cli"
    }

    async fn generate_key_and_csr(
        &self,
        subject: &Subject,
        key_size_bits: u32,
    ) -> Result<GeneratedKeyPair> {
        let key_pem = self
            .run(["genrsa".to_string(), key_size_bits.to_string()])
            .await
            .context("openssl genrsa failed")?;

        // `req -new` needs the key as a file; it lives only for this call
        let staged_key = stage_file(&self.scratch_dir, "keygen_", ".key", &key_pem)?;
        let subject_arg = subject.to_subject_string();

        let csr_pem = self
            .run([
                OsStr::new("req"),
                OsStr::new("-new"),
                OsStr::new("-sha256"),
                OsStr::new("-key"),
                staged_key.path().as_os_str(),
                OsStr::new("-subj"),
                OsStr::new(&subject_arg),
            ])
            .await
            .context("openssl req -new failed")?;

        let key_pem = String::from_utf8(key_pem).context("Private key PEM is not UTF-8")?;
        let csr_pem = String::from_utf8(csr_pem).context("CSR PEM is not UTF-8")?;
        Ok(GeneratedKeyPair::new(key_pem, csr_pem))
    }

    async fn verify_csr_self_consistency(&self, csr_pem: &str) -> Result<String> {
        let staged_csr = stage_file(&self.scratch_dir, "verify_", ".csr", csr_pem.as_bytes())?;

        let report = self
            .run([
                OsStr::new("req"),
                OsStr::new("-text"),
                OsStr::new("-noout"),
                OsStr::new("-verify"),
                OsStr::new("-in"),
                staged_csr.path().as_os_str(),
            ])
            .await
            .context("openssl req -verify failed")?;

        String::from_utf8(report).context("Verification report is not UTF-8")
    }

    async fn tool_version(&self) -> Result<String> {
        let stdout = self.run(["version"]).await?;
        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    }
}
