//! Crawler runtime configuration
//!
//! Everything a run needs is resolved once here and passed down explicitly:
//! database location, endpoints, retry policy, mail credentials.

use crate::fetcher::{Endpoints, RetryPolicy};
use std::path::{Path, PathBuf};
use std::time::Duration;
use wtn_common::config::{DataFolderInitializer, DataFolderResolver, TomlConfig};

pub const ENV_MAIL_SENDER: &str = "WTN_MAIL_SENDER";
pub const ENV_MAIL_TOKEN: &str = "WTN_MAIL_TOKEN";
pub const ENV_ADMIN_EMAIL: &str = "WTN_ADMIN_EMAIL";

/// Mail relay credentials and report recipient
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    pub mail_endpoint: Option<String>,
    pub mail_sender: Option<String>,
    pub mail_token: Option<String>,
    pub admin_email: Option<String>,
}

impl Credentials {
    /// Environment first, then TOML
    pub fn resolve(toml: &TomlConfig) -> Self {
        Self {
            mail_endpoint: toml.mail.endpoint.clone(),
            mail_sender: env_var(ENV_MAIL_SENDER).or_else(|| toml.mail.sender.clone()),
            mail_token: env_var(ENV_MAIL_TOKEN).or_else(|| toml.mail.token.clone()),
            admin_email: env_var(ENV_ADMIN_EMAIL).or_else(|| toml.admin_email.clone()),
        }
    }

    /// Endpoint, sender and token, if all three are present
    pub fn mail_relay(&self) -> Option<(&str, &str, &str)> {
        Some((
            self.mail_endpoint.as_deref()?,
            self.mail_sender.as_deref()?,
            self.mail_token.as_deref()?,
        ))
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    pub data_folder: PathBuf,
    pub database_path: PathBuf,
    pub endpoints: Endpoints,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub credentials: Credentials,
}

impl CrawlerConfig {
    /// Resolve from CLI overrides, environment and the bootstrap TOML
    ///
    /// An explicit `database_path` in TOML wins over `<data_folder>/webtoons.db`.
    pub fn resolve(cli_data_folder: Option<&Path>, toml: &TomlConfig) -> Self {
        let data_folder = DataFolderResolver::new(cli_data_folder, Some(toml)).resolve();
        let database_path = match (&toml.database_path, cli_data_folder) {
            (Some(path), None) => path.clone(),
            _ => DataFolderInitializer::new(data_folder.clone()).database_path(),
        };

        Self {
            data_folder,
            database_path,
            endpoints: Endpoints::from(&toml.api),
            retry: RetryPolicy::from(&toml.retry),
            request_timeout: Duration::from_secs(toml.api.request_timeout_secs.max(1)),
            user_agent: toml.api.user_agent.clone(),
            credentials: Credentials::resolve(toml),
        }
    }

    /// Create the data folder when the database lives inside it
    ///
    /// An explicit database path elsewhere is left to the database layer.
    pub fn ensure_data_folder(&self) -> wtn_common::Result<()> {
        if self.database_path.starts_with(&self.data_folder) {
            DataFolderInitializer::new(self.data_folder.clone()).ensure_directory_exists()?;
        }
        Ok(())
    }
}
