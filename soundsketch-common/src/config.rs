//! Configuration loading
//!
//! Settings come from a TOML file with per-section defaults, with
//! environment variables overriding the two API keys:
//! 1. Environment variable (highest priority)
//! 2. TOML config file
//! 3. Compiled default
//!
//! The config file is located by explicit path (CLI argument), then the
//! platform config directory (`~/.config/soundsketch/config.toml` on Linux).

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable holding the Freesound API token
pub const ENV_FREESOUND_API_KEY: &str = "SOUNDSKETCH_FREESOUND_API_KEY";
/// Environment variable holding the LLM API key
pub const ENV_LLM_API_KEY: &str = "SOUNDSKETCH_LLM_API_KEY";

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Sound-search collaborator settings
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Freesound API token
    pub api_key: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_sort")]
    pub sort: String,
    /// Preferred loop duration window for the search filter, in seconds
    #[serde(default = "default_min_duration")]
    pub min_duration_secs: u32,
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: u32,
    /// Deadline for primary fetch and swap queries
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
    /// Tighter deadline used by shortfall backfill queries
    #[serde(default = "default_backfill_timeout")]
    pub backfill_timeout_secs: u64,
}

/// Language-model collaborator settings
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub enabled: bool,
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// Deadline for the tag-analysis call
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

/// Result cache settings
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    5740
}
fn default_page_size() -> u32 {
    10
}
fn default_sort() -> String {
    "rating_desc".to_string()
}
fn default_min_duration() -> u32 {
    30
}
fn default_max_duration() -> u32 {
    240
}
fn default_search_timeout() -> u64 {
    10
}
fn default_backfill_timeout() -> u64 {
    8
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_llm_timeout() -> u64 {
    15
}
fn default_max_tokens() -> u32 {
    800
}
fn default_temperature() -> f32 {
    0.3
}
fn default_ttl_hours() -> u64 {
    24
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            page_size: default_page_size(),
            sort: default_sort(),
            min_duration_secs: default_min_duration(),
            max_duration_secs: default_max_duration(),
            timeout_secs: default_search_timeout(),
            backfill_timeout_secs: default_backfill_timeout(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            model: default_model(),
            base_url: default_llm_base_url(),
            timeout_secs: default_llm_timeout(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
        }
    }
}

impl TomlConfig {
    /// Load configuration.
    ///
    /// An explicitly given path must exist and parse; a missing default
    /// config file falls back to compiled defaults. Environment overrides
    /// for API keys are applied after loading.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match explicit_path {
            Some(path) => Self::parse_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::parse_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Apply environment-variable overrides for the two API keys.
    ///
    /// Warns when a key is present in multiple sources, since that is a
    /// common misconfiguration when rotating tokens.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(ENV_FREESOUND_API_KEY) {
            if !key.trim().is_empty() {
                if self.search.api_key.is_some() {
                    warn!(
                        "Freesound API key found in both environment and TOML, \
                         using environment"
                    );
                }
                self.search.api_key = Some(key);
            }
        }
        if let Ok(key) = std::env::var(ENV_LLM_API_KEY) {
            if !key.trim().is_empty() {
                if self.llm.api_key.is_some() {
                    warn!("LLM API key found in both environment and TOML, using environment");
                }
                self.llm.api_key = Some(key);
            }
        }
    }
}

/// Default configuration file path for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("soundsketch").join("config.toml"))
}
