//! Configuration parsing and management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::tls::{CaSettings, Digest, DEFAULT_CA_NAME, MAX_KEY_BITS, MIN_KEY_BITS};

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Root authority settings
    #[serde(default)]
    pub ca: CaConfig,

    /// Certificate store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Root authority configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CaConfig {
    /// CA bundle (private key followed by certificate). `~/` expands to the
    /// home directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// RSA modulus size for newly generated authorities
    #[serde(default = "default_key_bits")]
    pub key_bits: usize,

    /// Signing digest for the root and its leaves
    #[serde(default)]
    pub digest: Digest,

    #[serde(default = "default_ca_name")]
    pub common_name: String,

    #[serde(default = "default_ca_name")]
    pub organization: String,
}

impl Default for CaConfig {
    fn default() -> Self {
        Self {
            path: None,
            key_bits: default_key_bits(),
            digest: Digest::default(),
            common_name: default_ca_name(),
            organization: default_ca_name(),
        }
    }
}

impl CaConfig {
    pub fn settings(&self) -> CaSettings {
        CaSettings {
            key_bits: self.key_bits,
            digest: self.digest,
            common_name: self.common_name.clone(),
            organization: self.organization.clone(),
        }
    }

    /// The bundle path with a leading `~/` expanded.
    pub fn bundle_path(&self) -> Option<PathBuf> {
        self.path.as_deref().map(expand_home)
    }
}

fn default_key_bits() -> usize {
    MIN_KEY_BITS
}

fn default_ca_name() -> String {
    DEFAULT_CA_NAME.to_string()
}

/// Certificate store configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Directory holding issued leaves. A temporary directory is used,
    /// and removed afterwards, when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(MIN_KEY_BITS..=MAX_KEY_BITS).contains(&self.ca.key_bits) {
            return Err(Error::config(format!(
                "ca.key_bits = {} is outside {}..={}",
                self.ca.key_bits, MIN_KEY_BITS, MAX_KEY_BITS
            )));
        }
        if self.ca.common_name.is_empty() {
            return Err(Error::config("ca.common_name must not be empty"));
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(Error::config(format!(
                "logging.level {:?} must be one of {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }
}
