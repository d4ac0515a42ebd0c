//! Application configuration for Newsdesk.
//!
//! User config lives at `~/.newsdesk/newsdesk.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{NewsdeskError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "newsdesk.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".newsdesk";

// ---------------------------------------------------------------------------
// Config structs (matching newsdesk.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database location.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Summarization service settings.
    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    /// Outbound HTTP settings shared by all sources.
    #[serde(default)]
    pub http: HttpConfig,

    /// Run-level policy.
    #[serde(default)]
    pub sync: SyncPolicyConfig,

    /// Publishers to ingest, processed in order.
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            enrichment: EnrichmentConfig::default(),
            http: HttpConfig::default(),
            sync: SyncPolicyConfig::default(),
            sources: default_sources(),
        }
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the libSQL database file. A leading `~/` expands to the home directory.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "~/.newsdesk/newsdesk.db".into()
}

/// `[enrichment]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Whether to summarize items before persisting them.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Chat model used for summaries.
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout.
    #[serde(default = "default_enrichment_timeout")]
    pub timeout_secs: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key_env: default_api_key_env(),
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_enrichment_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_enrichment_timeout() -> u64 {
    60
}

/// `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout for listing and article fetches.
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,

    /// Maximum redirects followed per request.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout(),
            max_redirects: default_max_redirects(),
        }
    }
}

fn default_http_timeout() -> u64 {
    30
}
fn default_max_redirects() -> usize {
    5
}

/// `[sync]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncPolicyConfig {
    /// Stop the whole run at the first source that fails fatally.
    /// When false, the failure is recorded and the next source runs.
    #[serde(default)]
    pub abort_on_source_failure: bool,
}

/// Publisher variants with a built-in adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Cnn,
    Bbc,
    Aljazeera,
    Guardian,
    Reuters,
}

impl SourceKind {
    pub const ALL: [SourceKind; 5] = [
        Self::Cnn,
        Self::Bbc,
        Self::Aljazeera,
        Self::Guardian,
        Self::Reuters,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cnn => "cnn",
            Self::Bbc => "bbc",
            Self::Aljazeera => "aljazeera",
            Self::Guardian => "guardian",
            Self::Reuters => "reuters",
        }
    }

    /// Fetch parallelism the publisher tolerates.
    pub fn default_concurrency(&self) -> usize {
        match self {
            Self::Cnn => 1,
            Self::Bbc | Self::Aljazeera | Self::Guardian | Self::Reuters => 2,
        }
    }

    /// Whether the generated default config enables this publisher.
    /// Reuters answers only with a browser session cookie set in `headers`.
    pub fn enabled_by_default(&self) -> bool {
        !matches!(self, Self::Reuters)
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceKind {
    type Err = NewsdeskError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| NewsdeskError::config(format!("unknown source kind '{s}'")))
    }
}

/// `[[sources]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Overrides the publisher's default fetch concurrency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    /// Overrides the listing endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing_url: Option<String>,

    /// Overrides the base used to build absolute article URLs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Extra request headers sent with every listing and article request
    /// (e.g. `cookie`, `user-agent`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl SourceConfig {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            enabled: true,
            concurrency: None,
            listing_url: None,
            base_url: None,
            headers: BTreeMap::new(),
        }
    }

    /// Effective fetch concurrency, never below one.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency
            .unwrap_or_else(|| self.kind.default_concurrency())
            .max(1)
    }
}

fn default_sources() -> Vec<SourceConfig> {
    SourceKind::ALL
        .into_iter()
        .map(|kind| SourceConfig {
            enabled: kind.enabled_by_default(),
            ..SourceConfig::new(kind)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Sync config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime sync configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Run the enrichment stage.
    pub enrich: bool,
    /// Stop at the first fatal source error.
    pub abort_on_source_failure: bool,
}

impl From<&AppConfig> for SyncConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            enrich: config.enrichment.enabled,
            abort_on_source_failure: config.sync.abort_on_source_failure,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.newsdesk/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| NewsdeskError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.newsdesk/newsdesk.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| NewsdeskError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| NewsdeskError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| NewsdeskError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| NewsdeskError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| NewsdeskError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the configured database path, expanding a leading `~/`.
pub fn resolve_db_path(config: &AppConfig) -> Result<PathBuf> {
    let raw = config.storage.db_path.trim();
    if raw.is_empty() {
        return Err(NewsdeskError::config("storage.db_path is empty"));
    }
    match raw.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| NewsdeskError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(raw)),
    }
}

/// Read the summarization API key from the env var named in config.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.enrichment.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(NewsdeskError::config(format!(
            "enrichment API key not found. Set the {var_name} environment variable \
             or disable enrichment with `enabled = false`."
        ))),
    }
}
