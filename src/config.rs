//! Centralized configuration management for mediatheque

use std::path::PathBuf;
use std::time::Duration;
use anyhow::{Result, Context};

const DEFAULT_API_URL: &str = "http://localhost:5000/api";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory where PDF and CSV exports are written
    pub export_dir: PathBuf,
    /// Interval between client-side loan status refreshes (seconds)
    pub status_refresh_seconds: u64,
    /// Backend API configuration
    pub api: ApiConfig,
}

/// Backend API configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the REST backend, without trailing slash
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout_seconds: 30,
            user_agent: "mediatheque/0.1.0".to_string(),
        }
    }
}

impl ApiConfig {
    /// Get HTTP timeout as Duration
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            export_dir: PathBuf::from("./exports"),
            status_refresh_seconds: 60,
            api: ApiConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables and defaults
    pub fn from_env() -> Result<Self> {
        // A missing .env file is the normal case
        let _ = dotenvy::dotenv();
        Self::from_source(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_source<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let base_url = lookup("MEDIATHEQUE_API_URL")
            .unwrap_or(defaults.api.base_url)
            .trim_end_matches('/')
            .to_string();

        let api = ApiConfig {
            base_url,
            timeout_seconds: parse_var(&lookup, "MEDIATHEQUE_HTTP_TIMEOUT_SECONDS")?
                .unwrap_or(defaults.api.timeout_seconds),
            user_agent: lookup("MEDIATHEQUE_USER_AGENT").unwrap_or(defaults.api.user_agent),
        };

        let export_dir = lookup("MEDIATHEQUE_EXPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.export_dir);

        let status_refresh_seconds = parse_var(&lookup, "MEDIATHEQUE_STATUS_REFRESH_SECONDS")?
            .unwrap_or(defaults.status_refresh_seconds);

        Ok(Config {
            export_dir,
            status_refresh_seconds,
            api,
        })
    }

    /// Get loan status refresh interval as Duration
    pub fn status_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.status_refresh_seconds)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        reqwest::Url::parse(&self.api.base_url)
            .with_context(|| format!("Invalid API base URL: {}", self.api.base_url))?;

        if self.status_refresh_seconds == 0 {
            return Err(anyhow::anyhow!(
                "Status refresh interval must be at least one second"
            ));
        }

        std::fs::create_dir_all(&self.export_dir)
            .with_context(|| format!("Cannot create export directory: {}", self.export_dir.display()))?;

        Ok(())
    }
}

/// Parse a variable from the lookup source as a specific type
fn parse_var<F, T>(lookup: &F, var_name: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display + Send + Sync + std::error::Error + 'static,
{
    match lookup(var_name) {
        Some(val) => val.parse().map(Some).with_context(|| {
            format!("Failed to parse environment variable {} = '{}'", var_name, val)
        }),
        None => Ok(None),
    }
}
