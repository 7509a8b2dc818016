//! Bootstrap configuration and data folder resolution
//!
//! Two layers, mirroring how the crawler is deployed (one scheduled run per day):
//! 1. **TOML bootstrap file** (`wtn.toml`): endpoints, retry policy, mail relay,
//!    logging. Missing file is not an error; compiled defaults apply.
//! 2. **Environment**: credentials and path overrides.
//!
//! # Resolution priority
//!
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming the data folder
pub const ENV_DATA_FOLDER: &str = "WTN_DATA_FOLDER";

/// Environment variable naming the TOML bootstrap file
pub const ENV_CONFIG_FILE: &str = "WTN_CONFIG";

/// Database file name inside the data folder
pub const DATABASE_FILE_NAME: &str = "webtoons.db";

/// Compiled defaults used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub data_folder: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    /// Defaults for the platform we were built for
    pub fn for_current_platform() -> Self {
        let data_folder = if cfg!(target_os = "linux") {
            // ~/.local/share/wtn (or /var/lib/wtn for system-wide)
            dirs::data_local_dir()
                .map(|d| d.join("wtn"))
                .unwrap_or_else(|| PathBuf::from("/var/lib/wtn"))
        } else if cfg!(target_os = "macos") {
            // ~/Library/Application Support/wtn
            dirs::data_dir()
                .map(|d| d.join("wtn"))
                .unwrap_or_else(|| PathBuf::from("/Library/Application Support/wtn"))
        } else if cfg!(target_os = "windows") {
            // %LOCALAPPDATA%\wtn
            dirs::data_local_dir()
                .map(|d| d.join("wtn"))
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\wtn"))
        } else {
            PathBuf::from("./wtn_data")
        };

        Self {
            data_folder,
            log_level: "info".to_string(),
        }
    }
}

/// Bootstrap configuration loaded from TOML
///
/// Every section is optional; an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Folder holding the SQLite database
    #[serde(default)]
    pub data_folder: Option<PathBuf>,

    /// Explicit database path (overrides `data_folder`/webtoons.db)
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Address receiving the daily run report
    #[serde(default)]
    pub admin_email: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub mail: MailConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
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

/// Upstream catalog API configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    /// Per-weekday listing endpoint; `week={key}` is appended
    #[serde(default = "default_category_url")]
    pub category_url: String,

    /// Paginated finished/candidate listing endpoint
    #[serde(default = "default_finished_url")]
    pub finished_url: String,

    /// Records requested per candidate page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Hard ceiling on candidate pages per run
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            category_url: default_category_url(),
            finished_url: default_finished_url(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// Retry policy for upstream requests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Add up to 25% random jitter to each backoff
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter: false,
        }
    }
}

/// Mail relay used for completion notices and the admin report
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MailConfig {
    /// HTTP endpoint accepting `{from, to, subject, text}` JSON
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Sender address (credential; env `WTN_MAIL_SENDER` wins)
    #[serde(default)]
    pub sender: Option<String>,

    /// Bearer token (credential; env `WTN_MAIL_TOKEN` wins)
    #[serde(default)]
    pub token: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_category_url() -> String {
    "https://comic.naver.com/api/webtoon/titlelist/weekday".to_string()
}

fn default_finished_url() -> String {
    "https://comic.naver.com/api/webtoon/titlelist/finished".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_max_pages() -> u32 {
    200
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("wtn-crawler/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    2_000
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

/// Locate the TOML bootstrap file
///
/// CLI argument, then `WTN_CONFIG`, then `<config_dir>/wtn/wtn.toml`.
/// Returns `None` when no candidate is known (not when the file is missing).
pub fn config_file_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(ENV_CONFIG_FILE) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir().map(|d| d.join("wtn").join("wtn.toml"))
}

/// Load the bootstrap TOML file with graceful degradation
///
/// A missing file yields `TomlConfig::default()` with a warning. A file that
/// exists but does not parse is an error: silently ignoring a typo in the
/// endpoints would point the crawler at the wrong upstream.
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path else {
        warn!("No config file location known; using compiled defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!(path = %path.display(), "Config file not found; using compiled defaults");
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)?;
    info!(path = %path.display(), "Loaded config file");
    Ok(config)
}

/// Resolves the data folder using the documented priority order
pub struct DataFolderResolver<'a> {
    cli_arg: Option<&'a Path>,
    toml: Option<&'a TomlConfig>,
}

impl<'a> DataFolderResolver<'a> {
    pub fn new(cli_arg: Option<&'a Path>, toml: Option<&'a TomlConfig>) -> Self {
        Self { cli_arg, toml }
    }

    pub fn resolve(&self) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = self.cli_arg {
            debug!(path = %path.display(), "Data folder from command line");
            return path.to_path_buf();
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(ENV_DATA_FOLDER) {
            if !path.trim().is_empty() {
                debug!(path = %path, "Data folder from {}", ENV_DATA_FOLDER);
                return PathBuf::from(path);
            }
        }

        // Priority 3: TOML config file
        if let Some(path) = self.toml.and_then(|t| t.data_folder.as_ref()) {
            debug!(path = %path.display(), "Data folder from config file");
            return path.clone();
        }

        // Priority 4: OS-dependent compiled default
        CompiledDefaults::for_current_platform().data_folder
    }
}

/// Creates the data folder and derives the database path inside it
pub struct DataFolderInitializer {
    data_folder: PathBuf,
}

impl DataFolderInitializer {
    pub fn new(data_folder: PathBuf) -> Self {
        Self { data_folder }
    }

    /// Create the folder (and parents) if missing; idempotent
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_folder).map_err(|e| {
            Error::Config(format!(
                "Cannot create data folder {}: {}",
                self.data_folder.display(),
                e
            ))
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_folder.join(DATABASE_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_backoff_ms, 2_000);
        assert_eq!(config.retry.max_backoff_ms, 10_000);
        assert_eq!(config.api.page_size, 100);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            [api]
            max_pages = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.api.max_pages, 5);
        assert_eq!(config.api.page_size, 100);
        assert!(config.api.category_url.ends_with("/weekday"));
    }

    #[test]
    fn test_cli_arg_wins_config_path() {
        let path = config_file_path(Some(Path::new("/tmp/explicit.toml")));
        assert_eq!(path, Some(PathBuf::from("/tmp/explicit.toml")));
    }
}
