//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/shelf/config.toml)
//! 3. Environment variables (SHELF_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix
const ENV_PREFIX: &str = "SHELF";

/// Default remote object store endpoint
pub const DEFAULT_REMOTE_URL: &str = "https://api.bmobcloud.com";

/// Default page size (in characters) for unstructured text
pub const DEFAULT_PAGE_SIZE: usize = 5000;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage (local cache database)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Remote object store settings
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Text reader settings
    #[serde(default)]
    pub reader: ReaderConfig,

    /// Upper bound on cached book content, in megabytes
    #[serde(default)]
    pub cache_limit_mb: Option<u64>,

    /// Write logs to this file instead of stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

/// Remote object store connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteConfig {
    #[serde(default = "default_remote_url")]
    pub base_url: String,

    #[serde(default)]
    pub application_id: Option<String>,

    #[serde(default)]
    pub rest_api_key: Option<String>,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_remote_url(),
            application_id: None,
            rest_api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RemoteConfig {
    /// Whether both credentials are present
    pub fn is_configured(&self) -> bool {
        self.application_id.as_deref().is_some_and(|s| !s.is_empty())
            && self.rest_api_key.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// Segmentation and decoding settings for plain-text books
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReaderConfig {
    /// Characters per page when no chapter headings are found
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Title of the chapter holding text before the first heading
    #[serde(default = "default_preamble_title")]
    pub preamble_title: String,

    /// Page title template; `{n}` is replaced with the 1-based page number
    #[serde(default = "default_page_title")]
    pub page_title: String,

    /// Encoding label tried when content is not valid UTF-8
    #[serde(default = "default_legacy_encoding")]
    pub legacy_encoding: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            preamble_title: default_preamble_title(),
            page_title: default_page_title(),
            legacy_encoding: default_legacy_encoding(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            remote: RemoteConfig::default(),
            reader: ReaderConfig::default(),
            cache_limit_mb: None,
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (SHELF_DATA_DIR, SHELF_REMOTE_URL, SHELF_APP_ID, SHELF_API_KEY)
    /// 2. Config file (~/.config/shelf/config.toml or SHELF_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring an explicit path (e.g. from `--config`)
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_REMOTE_URL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.remote.base_url = val;
            }
        }

        // Empty string clears the credential
        if let Ok(val) = std::env::var(format!("{}_APP_ID", ENV_PREFIX)) {
            self.remote.application_id = if val.is_empty() { None } else { Some(val) };
        }

        if let Ok(val) = std::env::var(format!("{}_API_KEY", ENV_PREFIX)) {
            self.remote.rest_api_key = if val.is_empty() { None } else { Some(val) };
        }
    }

    fn validate(&self) -> Result<()> {
        if self.reader.page_size == 0 {
            anyhow::bail!("reader.page_size must be greater than zero");
        }
        let label = self.reader.legacy_encoding.trim();
        if encoding_rs::Encoding::for_label(label.as_bytes()).is_none() {
            anyhow::bail!(
                "Unknown reader.legacy_encoding '{}'",
                self.reader.legacy_encoding
            );
        }
        Ok(())
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default config file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with SHELF_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shelf")
            .join("config.toml")
    }

    /// Get the path to the local cache database
    pub fn cache_db_path(&self) -> PathBuf {
        self.data_dir.join("reader.db")
    }

    /// Cache budget in bytes, if one is configured
    pub fn cache_limit_bytes(&self) -> Option<u64> {
        self.cache_limit_mb.map(|mb| mb.saturating_mul(1024 * 1024))
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shelf")
}

fn default_remote_url() -> String {
    DEFAULT_REMOTE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_preamble_title() -> String {
    "Start".to_string()
}

fn default_page_title() -> String {
    "Page {n}".to_string()
}

fn default_legacy_encoding() -> String {
    "gbk".to_string()
}
