//! Application configuration for sitegraph.
//!
//! User config lives at `~/.sitegraph/sitegraph.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SiteGraphError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "sitegraph.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sitegraph";

// ---------------------------------------------------------------------------
// Config structs (matching sitegraph.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database location.
    #[serde(default)]
    pub storage: StorageSection,

    /// Crawl settings.
    #[serde(default)]
    pub crawl: CrawlSection,

    /// Tagging service settings.
    #[serde(default)]
    pub tagger: TaggerSection,
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSection {
    /// Path to the libSQL database file. `~` expands to the home directory.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "~/.sitegraph/sitegraph.db".into()
}

impl StorageSection {
    /// Resolve `database_path`, expanding a leading `~/`.
    pub fn resolved_database_path(&self) -> Result<PathBuf> {
        match self.database_path.strip_prefix("~/") {
            Some(rest) => {
                let home = dirs::home_dir().ok_or_else(|| {
                    SiteGraphError::config("could not determine home directory")
                })?;
                Ok(home.join(rest))
            }
            None => Ok(PathBuf::from(&self.database_path)),
        }
    }
}

/// `[crawl]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSection {
    /// Maximum link depth from the start URL (0 = unlimited).
    #[serde(default)]
    pub depth: u32,

    /// Concurrent requests.
    #[serde(default = "default_crawl_concurrency")]
    pub concurrency: u32,

    /// Delay in ms before each request.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    /// Upper bound on fetched resources per crawl.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Fetch linked images and PDFs as binary resources.
    #[serde(default = "default_true")]
    pub fetch_binaries: bool,

    /// URL path include patterns.
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// URL path exclude patterns.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

impl Default for CrawlSection {
    fn default() -> Self {
        Self {
            depth: 0,
            concurrency: default_crawl_concurrency(),
            rate_limit_ms: default_rate_limit(),
            max_pages: default_max_pages(),
            fetch_binaries: true,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
        }
    }
}

fn default_crawl_concurrency() -> u32 {
    4
}
fn default_rate_limit() -> u64 {
    2000
}
fn default_max_pages() -> usize {
    500
}
fn default_true() -> bool {
    true
}

/// `[tagger]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggerSection {
    /// Base URL of the tagging service.
    #[serde(default = "default_tagger_endpoint")]
    pub endpoint: String,

    /// Language codes the service supports; anything else is skipped.
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Per-call timeout.
    #[serde(default = "default_tagger_timeout")]
    pub timeout_ms: u64,

    /// Attempts per sentence before it is skipped.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff before the second attempt; doubles after each failure.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
}

impl Default for TaggerSection {
    fn default() -> Self {
        Self {
            endpoint: default_tagger_endpoint(),
            languages: default_languages(),
            timeout_ms: default_tagger_timeout(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
        }
    }
}

fn default_tagger_endpoint() -> String {
    "http://127.0.0.1:8090".into()
}
fn default_languages() -> Vec<String> {
    vec!["de".into(), "en".into()]
}
fn default_tagger_timeout() -> u64 {
    5000
}
fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff() -> u64 {
    250
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime crawl configuration.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Maximum crawl depth from the start URL (0 = unlimited).
    pub depth: u32,
    /// Maximum concurrent HTTP requests.
    pub concurrency: u32,
    /// Delay in ms before each request.
    pub rate_limit_ms: u64,
    /// Upper bound on fetched resources.
    pub max_pages: usize,
    /// Fetch linked images and PDFs.
    pub fetch_binaries: bool,
    /// URL include glob patterns.
    pub include_patterns: Vec<String>,
    /// URL exclude glob patterns.
    pub exclude_patterns: Vec<String>,
}

impl From<&AppConfig> for CrawlConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            depth: config.crawl.depth,
            concurrency: config.crawl.concurrency.max(1),
            rate_limit_ms: config.crawl.rate_limit_ms,
            max_pages: config.crawl.max_pages,
            fetch_binaries: config.crawl.fetch_binaries,
            include_patterns: config.crawl.include_patterns.clone(),
            exclude_patterns: config.crawl.exclude_patterns.clone(),
        }
    }
}

/// Runtime tagging configuration.
#[derive(Debug, Clone)]
pub struct TaggerConfig {
    pub endpoint: String,
    pub languages: Vec<String>,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl From<&AppConfig> for TaggerConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            endpoint: config.tagger.endpoint.clone(),
            languages: config
                .tagger
                .languages
                .iter()
                .map(|l| l.to_ascii_lowercase())
                .collect(),
            timeout: Duration::from_millis(config.tagger.timeout_ms),
            max_attempts: config.tagger.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.tagger.initial_backoff_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.sitegraph/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SiteGraphError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.sitegraph/sitegraph.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| SiteGraphError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        SiteGraphError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SiteGraphError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SiteGraphError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SiteGraphError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("database_path"));
        assert!(toml_str.contains("rate_limit_ms"));
        assert!(toml_str.contains("127.0.0.1:8090"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.crawl.rate_limit_ms, 2000);
        assert_eq!(parsed.tagger.languages, vec!["de", "en"]);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[tagger]
endpoint = "http://tagger.internal:9000"
languages = ["DE"]

[crawl]
depth = 2
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.crawl.depth, 2);
        assert_eq!(config.crawl.concurrency, 4);
        assert_eq!(config.tagger.max_attempts, 3);

        let tagger = TaggerConfig::from(&config);
        assert_eq!(tagger.languages, vec!["de"]);
        assert_eq!(tagger.timeout, Duration::from_millis(5000));
    }

    #[test]
    fn crawl_config_from_app_config() {
        let app = AppConfig::default();
        let crawl = CrawlConfig::from(&app);
        assert_eq!(crawl.depth, 0);
        assert_eq!(crawl.concurrency, 4);
        assert!(crawl.fetch_binaries);
    }

    #[test]
    fn database_path_expansion() {
        let absolute = StorageSection {
            database_path: "/var/lib/sitegraph.db".into(),
        };
        assert_eq!(
            absolute.resolved_database_path().unwrap(),
            PathBuf::from("/var/lib/sitegraph.db")
        );

        let tilde = StorageSection::default();
        let resolved = tilde.resolved_database_path().unwrap();
        assert!(resolved.ends_with(".sitegraph/sitegraph.db"));
    }
}
