//! Configuration management for the registry backup tool.
//!
//! Loads configuration from a TOML file with environment variable overrides.

use crate::utils::errors::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub backup: BackupConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// URL scheme of the registry API (http or https)
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Registry authority, e.g. `harbor.example.com` or `10.0.0.5:8443`
    #[serde(default)]
    pub host: String,

    /// Pre-encoded Basic credential, sent verbatim
    #[serde(default)]
    pub credential: String,

    /// Items requested per catalog page
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Directory holding the `full_*` / `delta_*` run directories
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// File recording the directory of the most recent full backup
    #[serde(default = "default_pointer_file")]
    pub pointer_file: PathBuf,

    /// Maximum number of references pulled/exported at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// External image tool used for pull and save
    #[serde(default = "default_tool")]
    pub tool: String,

    /// Manifest file name inside a run directory
    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,

    /// Delta subset file name inside a delta run directory
    #[serde(default = "default_diff_name")]
    pub diff_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values
fn default_scheme() -> String {
    "https".to_string()
}

fn default_page_size() -> u32 {
    100 // registry maximum
}

fn default_root() -> PathBuf {
    PathBuf::from("./artifacts")
}

fn default_pointer_file() -> PathBuf {
    PathBuf::from("./last_full_backup_path.txt")
}

fn default_concurrency() -> usize {
    5
}

fn default_tool() -> String {
    "docker".to_string()
}

fn default_manifest_name() -> String {
    "download_list.txt".to_string()
}

fn default_diff_name() -> String {
    "diff_list.txt".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            host: String::new(),
            credential: String::new(),
            page_size: default_page_size(),
        }
    }
}

impl RegistryConfig {
    /// Base URL of the registry REST API.
    pub fn api_base_url(&self) -> String {
        format!("{}://{}/api/v2.0", self.scheme, self.host)
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            pointer_file: default_pointer_file(),
            concurrency: default_concurrency(),
            tool: default_tool(),
            manifest_name: default_manifest_name(),
            diff_name: default_diff_name(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply `HARBOR_*` overrides from the process environment.
    pub fn apply_env(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup; empty values are ignored.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(scheme) = get("HARBOR_SCHEME") {
            self.registry.scheme = scheme;
        }
        if let Some(host) = get("HARBOR_HOST") {
            self.registry.host = host;
        }
        if let Some(auth) = get("HARBOR_AUTH") {
            self.registry.credential = auth;
        }
        if let Some(root) = get("HARBOR_BACKUP_ROOT") {
            self.backup.root = PathBuf::from(root);
        }
        if let Some(c) = get("HARBOR_BACKUP_CONCURRENCY").and_then(|v| v.parse().ok()) {
            self.backup.concurrency = c;
        }
        if let Some(tool) = get("HARBOR_BACKUP_TOOL") {
            self.backup.tool = tool;
        }

        self
    }

    /// Base URL of the registry REST API.
    pub fn api_base_url(&self) -> String {
        self.registry.api_base_url()
    }

    /// Validate settings before contacting the registry.
    pub fn validate(&self, require_credential: bool) -> Result<()> {
        if self.registry.host.is_empty() {
            return Err(BackupError::Config(
                "registry host is not set (HARBOR_HOST or [registry].host)".to_string(),
            ));
        }

        match self.registry.scheme.as_str() {
            "http" | "https" => {}
            other => {
                return Err(BackupError::Config(format!(
                    "registry scheme must be http or https, got {}",
                    other
                )))
            }
        }

        if require_credential && self.registry.credential.is_empty() {
            return Err(BackupError::Config(
                "registry credential is not set (HARBOR_AUTH or [registry].credential)".to_string(),
            ));
        }

        if self.registry.page_size == 0 {
            return Err(BackupError::Config("page_size must be greater than 0".to_string()));
        }

        if self.backup.concurrency == 0 {
            return Err(BackupError::Config("concurrency must be greater than 0".to_string()));
        }

        Ok(())
    }
}
