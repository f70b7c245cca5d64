use crate::sanitizer::SanitizePolicy;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "CSR_WORKBENCH_CONFIG";
pub const OUTPUT_DIR_ENV: &str = "OUTPUT_DIR";
pub const PORT_ENV: &str = "PORT";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub crypto: CryptoConfig,
    #[serde(default)]
    pub sanitizer: SanitizePolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default)]
    pub tls_cert_path: Option<PathBuf>,
    #[serde(default)]
    pub tls_key_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    5000
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
        }
    }
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("./output")
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Link OpenSSL in-process
    #[default]
    Native,
    /// Shell out to the `openssl` binary
    Cli,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CryptoConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default = "default_openssl_binary")]
    pub openssl_binary: PathBuf,
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            openssl_binary: default_openssl_binary(),
            command_timeout_secs: default_command_timeout_secs(),
        }
    }
}

impl CryptoConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

fn default_openssl_binary() -> PathBuf {
    PathBuf::from("openssl")
}

fn default_command_timeout_secs() -> u64 {
    30
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&config_str)
    }

    pub fn from_toml(config_str: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(config_str).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `$CSR_WORKBENCH_CONFIG` or `config.toml`, then
    /// apply environment overrides.
    ///
    /// A missing `config.toml` is not an error; defaults are used instead. A
    /// path named explicitly through the environment must exist.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => AppConfig::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `OUTPUT_DIR` and `PORT` overrides from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(OUTPUT_DIR_ENV).filter(|d| !d.is_empty()) {
            self.output.directory = PathBuf::from(dir);
        }
        if let Some(port) = lookup(PORT_ENV).filter(|p| !p.is_empty()) {
            self.server.port = port
                .parse()
                .context(format!("Invalid {} value: {}", PORT_ENV, port))?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        self.sanitizer
            .validate()
            .map_err(|e| anyhow!("Invalid [sanitizer] section: {}", e))?;
        if self.crypto.command_timeout_secs == 0 {
            return Err(anyhow!("crypto.command_timeout_secs must be greater than zero"));
        }
        if self.server.tls_cert_path.is_some() != self.server.tls_key_path.is_some() {
            return Err(anyhow!(
                "server.tls_cert_path and server.tls_key_path must be set together"
            ));
        }
        Ok(())
    }
}
