//! Gateway connection configuration.
//!
//! Supports YAML files and environment variable overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::{Identity, Url};
use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "etcd-gateway.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "ETCD_GATEWAY_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "ETCD_GATEWAY";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "ETCD_GATEWAY_LOG";

/// Connection parameters for one etcd gateway.
///
/// Read-only once handed to a client; reconfiguring means building a new
/// client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    scheme: String,
    host: String,
    port: u16,
    /// API version path segment, e.g. `v3`.
    version: String,
    /// Strip envelopes and flatten records in replies.
    pretty: bool,
    tls: bool,
    tls_cert: Option<PathBuf>,
    tls_key: Option<PathBuf>,
    /// Per-request timeout in seconds.
    timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            host: "127.0.0.1".to_string(),
            port: 2379,
            version: "v3".to_string(),
            pretty: false,
            tls: false,
            tls_cert: None,
            tls_key: None,
            timeout: 30,
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `DEFAULT_CONFIG_FILE` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix, e.g. `ETCD_GATEWAY__HOST`
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn is_pretty(&self) -> bool {
        self.pretty
    }

    pub fn is_tls(&self) -> bool {
        self.tls
    }

    pub fn tls_cert(&self) -> Option<&Path> {
        self.tls_cert.as_deref()
    }

    pub fn tls_key(&self) -> Option<&Path> {
        self.tls_key.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Enable TLS with a client certificate and key (PEM files).
    pub fn with_tls(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.tls = true;
        self.tls_cert = Some(cert.into());
        self.tls_key = Some(key.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = secs;
        self
    }

    /// `{scheme}://{host}:{port}/{version}/`, validated.
    ///
    /// The version segment is trimmed of whitespace and slashes. IPv6 hosts
    /// may be given bare (`::1`) or bracketed (`[::1]`).
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        if !matches!(self.scheme.as_str(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                self.scheme
            )));
        }

        // IPv6 literals need brackets inside a URL authority.
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        let version = self.version.trim().trim_matches('/');
        let raw = if version.is_empty() {
            format!("{}://{}:{}/", self.scheme, host, self.port)
        } else {
            format!("{}://{}:{}/{}/", self.scheme, host, self.port, version)
        };

        let url = Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(format!("{raw}: {e}")))?;
        if url.host_str().map_or(true, str::is_empty) {
            return Err(ConfigError::InvalidUrl(format!("{raw}: missing host")));
        }
        Ok(url)
    }

    /// Client identity for TLS mode, read from the certificate and key files.
    ///
    /// Returns `None` when TLS is off.
    pub fn identity(&self) -> Result<Option<Identity>, ConfigError> {
        if !self.tls {
            return Ok(None);
        }

        let cert = self
            .tls_cert
            .as_deref()
            .ok_or_else(|| ConfigError::Tls("tls enabled but tls_cert is not set".to_string()))?;
        let key = self
            .tls_key
            .as_deref()
            .ok_or_else(|| ConfigError::Tls("tls enabled but tls_key is not set".to_string()))?;

        let mut pem = read_pem(cert)?;
        pem.push(b'\n');
        pem.extend(read_pem(key)?);

        Identity::from_pem(&pem)
            .map(Some)
            .map_err(|e| ConfigError::Tls(format!("invalid client identity: {e}")))
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>, ConfigError> {
    std::fs::read(path)
        .map_err(|e| ConfigError::Tls(format!("failed to read '{}': {e}", path.display())))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid gateway url: {0}")]
    InvalidUrl(String),

    #[error("failed to load config: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("tls setup failed: {0}")]
    Tls(String),
}
