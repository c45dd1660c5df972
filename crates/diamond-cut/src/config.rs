//! Engine configuration
//!
//! Loaded from TOML; a missing file means defaults. `DIAMOND_RPC_URL`
//! overrides the configured endpoint.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding [`NetworkConfig::rpc_url`]
pub const RPC_URL_ENV: &str = "DIAMOND_RPC_URL";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub network: NetworkConfig,
    pub paths: PathsConfig,
    pub ledger: LedgerConfig,
}

/// Target network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Label stored in snapshots and reports
    pub name: String,
    pub rpc_url: String,
    /// Enables the confirmation gate and the latest-report link
    pub production: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: "localhost".to_string(),
            rpc_url: "http://127.0.0.1:8545".to_string(),
            production: false,
        }
    }
}

/// Filesystem locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub artifacts: PathBuf,
    pub snapshots: PathBuf,
    pub reports: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            artifacts: PathBuf::from("artifacts"),
            snapshots: PathBuf::from("deployments/snapshots"),
            reports: PathBuf::from("deployments/reports"),
        }
    }
}

/// Transaction receipt polling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub receipt_poll_ms: u64,
    pub receipt_timeout_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            receipt_poll_ms: 1000,
            receipt_timeout_secs: 300,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// Returns error if the text is not valid configuration
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load from `path`; a missing file yields defaults. Environment
    /// overrides are applied.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Apply overrides from an environment lookup
    #[must_use]
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(RPC_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.network.rpc_url = url;
        }
        self
    }

    /// With network label
    #[inline]
    #[must_use]
    pub fn with_network(mut self, name: impl Into<String>) -> Self {
        self.network.name = name.into();
        self
    }

    /// With RPC endpoint
    #[inline]
    #[must_use]
    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.network.rpc_url = url.into();
        self
    }

    /// With production gating
    #[inline]
    #[must_use]
    pub fn with_production(mut self, production: bool) -> Self {
        self.network.production = production;
        self
    }

    /// With artifact directory
    #[inline]
    #[must_use]
    pub fn with_artifacts(mut self, dir: impl Into<PathBuf>) -> Self {
        self.paths.artifacts = dir.into();
        self
    }

    /// With snapshot store root
    #[inline]
    #[must_use]
    pub fn with_snapshots(mut self, dir: impl Into<PathBuf>) -> Self {
        self.paths.snapshots = dir.into();
        self
    }

    /// With report root
    #[inline]
    #[must_use]
    pub fn with_reports(mut self, dir: impl Into<PathBuf>) -> Self {
        self.paths.reports = dir.into();
        self
    }

    /// Report directory of the configured network
    #[must_use]
    pub fn reports_dir(&self) -> PathBuf {
        self.paths.reports.join(&self.network.name)
    }
}
