//! Configuration types
//!
//! Configuration is read from a TOML file (path in `DEPOT_CONFIG`) or from
//! `DEPOT_*` environment variables. Durations are expressed in milliseconds.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Request timeout applied to each store round-trip when none is configured.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
/// Cache refresh interval when none is configured.
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 60_000;
/// Upper bound on concurrent uploads issued by `put_dir`.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 20;

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_refresh_interval_ms() -> u64 {
    DEFAULT_REFRESH_INTERVAL_MS
}

fn default_max_concurrent_requests() -> usize {
    DEFAULT_MAX_CONCURRENT_REQUESTS
}

/// Object store connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Access key id. Falls back to the ambient AWS credential chain when absent.
    #[serde(default)]
    pub key: Option<String>,
    /// Secret access key.
    #[serde(default)]
    pub secret: Option<String>,
    /// Public base URL that component files are served from, e.g.
    /// `https://cdn.example.com/components/`.
    pub path: String,
    /// Prefix under which components are stored in the bucket.
    pub components_dir: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Proxy URL for all store requests.
    #[serde(default)]
    pub agent_proxy: Option<String>,
    /// Custom endpoint for S3-compatible services (MinIO, R2, ...).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Raw client option overrides, keyed by `object_store` S3 config names
    /// (e.g. `aws_virtual_hosted_style_request = "true"`).
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,
}

impl S3Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Master configuration for the storage adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DepotConfig {
    pub s3: S3Config,
    /// How long a cached file is served before it is refreshed.
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    /// Log cache activity at info level instead of debug.
    #[serde(default)]
    pub verbosity: bool,
}

impl DepotConfig {
    /// Load from the TOML file named by `DEPOT_CONFIG` and validate it.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("DEPOT_CONFIG")
            .ok()
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: DepotConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Create a DepotConfig from environment variables.
    ///
    /// Environment variables:
    /// - `DEPOT_S3_BUCKET`, `DEPOT_S3_REGION`, `DEPOT_S3_PATH`,
    ///   `DEPOT_S3_COMPONENTS_DIR` (required)
    /// - `DEPOT_S3_KEY`, `DEPOT_S3_SECRET`, `DEPOT_S3_ENDPOINT`,
    ///   `DEPOT_S3_AGENT_PROXY` (optional)
    /// - `DEPOT_S3_TIMEOUT_MS` (default: 10000)
    /// - `DEPOT_REFRESH_INTERVAL_MS` (default: 60000)
    /// - `DEPOT_MAX_CONCURRENT_REQUESTS` (default: 20)
    /// - `DEPOT_VERBOSITY`: "true" or "1" (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. `from_env` delegates here.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str, field: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingRequired { field })
        };
        let parsed = |name: &str, field: &'static str, default: u64| -> Result<u64, ConfigError> {
            match lookup(name) {
                Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    field,
                    reason: format!("expected an integer, got {:?}", raw),
                }),
                None => Ok(default),
            }
        };

        let s3 = S3Config {
            bucket: required("DEPOT_S3_BUCKET", "s3.bucket")?,
            region: required("DEPOT_S3_REGION", "s3.region")?,
            key: lookup("DEPOT_S3_KEY"),
            secret: lookup("DEPOT_S3_SECRET"),
            path: required("DEPOT_S3_PATH", "s3.path")?,
            components_dir: required("DEPOT_S3_COMPONENTS_DIR", "s3.components_dir")?,
            timeout_ms: parsed("DEPOT_S3_TIMEOUT_MS", "s3.timeout_ms", DEFAULT_TIMEOUT_MS)?,
            agent_proxy: lookup("DEPOT_S3_AGENT_PROXY"),
            endpoint: lookup("DEPOT_S3_ENDPOINT"),
            overrides: BTreeMap::new(),
        };

        let config = Self {
            s3,
            refresh_interval_ms: parsed(
                "DEPOT_REFRESH_INTERVAL_MS",
                "refresh_interval_ms",
                DEFAULT_REFRESH_INTERVAL_MS,
            )?,
            max_concurrent_requests: parsed(
                "DEPOT_MAX_CONCURRENT_REQUESTS",
                "max_concurrent_requests",
                DEFAULT_MAX_CONCURRENT_REQUESTS as u64,
            )? as usize,
            verbosity: lookup("DEPOT_VERBOSITY")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(false),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.s3.bucket.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "s3.bucket",
                reason: "must not be empty".to_string(),
            });
        }
        if self.s3.region.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "s3.region",
                reason: "must not be empty".to_string(),
            });
        }
        if self.s3.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "s3.timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.s3.key.is_some() != self.s3.secret.is_some() {
            return Err(ConfigError::InvalidValue {
                field: "s3.secret",
                reason: "key and secret must be provided together".to_string(),
            });
        }
        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "refresh_interval_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_concurrent_requests",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}
