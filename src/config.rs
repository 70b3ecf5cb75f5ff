//! JSON configuration for search runs.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Default search endpoint (Twitter v2 full-archive search).
pub const DEFAULT_SEARCH_URL: &str = "https://api.twitter.com/2/tweets/search/all";

/// Default OAuth2 token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://api.twitter.com/oauth2/token";

/// Default hourly request ceiling.
pub const DEFAULT_REQUESTS_PER_HOUR: u32 = 1000;

/// Configuration loading or validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("log_to_file set to true, but log_file_path is not set in configuration")]
    MissingLogPath,

    #[error("search_parameters value for '{0}' must be a string, number, or boolean")]
    BadParameter(String),
}

/// Configuration file structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// API key for the client-credentials grant.
    pub api_key: String,
    /// API secret for the client-credentials grant.
    pub api_secret: String,
    /// Directory where result pages are written.
    pub output_path: String,
    /// Query parameters sent with every search request.
    pub search_parameters: serde_json::Map<String, Value>,
    /// Also write logs to a file under `log_file_path`.
    #[serde(default)]
    pub log_to_file: bool,
    /// Directory for log files; required when `log_to_file` is set.
    #[serde(default)]
    pub log_file_path: Option<String>,
    /// Hourly request ceiling for the fetcher.
    #[serde(default = "default_requests_per_hour")]
    pub requests_per_hour: u32,
    /// Search endpoint URL.
    #[serde(default = "default_search_url")]
    pub search_url: String,
    /// OAuth2 token endpoint URL.
    #[serde(default = "default_token_url")]
    pub token_url: String,
}

fn default_requests_per_hour() -> u32 {
    DEFAULT_REQUESTS_PER_HOUR
}

fn default_search_url() -> String {
    DEFAULT_SEARCH_URL.to_string()
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

impl Config {
    /// Load configuration from a JSON file.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let mut config: Config =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Credentials can be supplied via environment instead of the file.
    fn apply_env_overrides(&mut self) {
        if let Some(key) = env_nonempty("TWEETVAULT_API_KEY") {
            self.api_key = key;
        }
        if let Some(secret) = env_nonempty("TWEETVAULT_API_SECRET") {
            self.api_secret = secret;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.log_to_file && self.log_file_path.is_none() {
            return Err(ConfigError::MissingLogPath);
        }
        Ok(())
    }

    /// Output directory with `~` expanded.
    pub fn output_dir(&self) -> PathBuf {
        expand_path(&self.output_path)
    }

    /// Log directory with `~` expanded, when file logging is enabled.
    pub fn log_dir(&self) -> Option<PathBuf> {
        if !self.log_to_file {
            return None;
        }
        self.log_file_path.as_deref().map(expand_path)
    }

    /// Flatten `search_parameters` into query pairs.
    ///
    /// Strings pass through; numbers and booleans are stringified. Nested
    /// structures are rejected rather than silently serialized.
    pub fn query_pairs(&self) -> Result<Vec<(String, String)>, ConfigError> {
        let mut pairs = Vec::with_capacity(self.search_parameters.len());
        for (key, value) in &self.search_parameters {
            let rendered = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return Err(ConfigError::BadParameter(key.clone())),
            };
            pairs.push((key.clone(), rendered));
        }
        Ok(pairs)
    }
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}
