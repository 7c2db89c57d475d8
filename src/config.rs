// Runtime configuration for an upload run. Values come from environment
// variables first and can be overridden by command-line flags (see `cli`).

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PATTERN: &str = "*.tgz";
pub const DEFAULT_PROXY_ADDRESS: &str = "127.0.0.1:8888";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Everything a run needs to know. The target URL is immutable for the
/// whole run; the file set is discovered from `directory` + `pattern`.
#[derive(Debug, Clone, PartialEq)]
pub struct UploaderConfig {
    pub target_url: String,
    pub directory: PathBuf,
    pub pattern: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub use_proxy: bool,
    pub proxy_address: String,
}

impl UploaderConfig {
    /// Defaults for everything except the target URL.
    pub fn new(target_url: impl Into<String>) -> Self {
        UploaderConfig {
            target_url: target_url.into(),
            directory: PathBuf::from("."),
            pattern: DEFAULT_PATTERN.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            use_proxy: false,
            proxy_address: DEFAULT_PROXY_ADDRESS.into(),
        }
    }

    /// Build a config from the `DATA_COLLECTION_*` environment variables,
    /// falling back to the defaults for anything unset.
    pub fn from_env(target_url: impl Into<String>) -> Result<Self> {
        Self::from_lookup(target_url, |key| std::env::var(key).ok())
    }

    /// Same as `from_env` but reads variables through `lookup`, which keeps
    /// the process environment out of unit tests.
    pub fn from_lookup<F>(target_url: impl Into<String>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(target_url);

        if let Some(pattern) = lookup("DATA_COLLECTION_PATTERN") {
            config.pattern = pattern;
        }
        if let Some(dir) = lookup("DATA_COLLECTION_DIR") {
            config.directory = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("DATA_COLLECTION_TIMEOUT_SECS") {
            config.timeout = parse_secs("DATA_COLLECTION_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("DATA_COLLECTION_CONNECT_TIMEOUT_SECS") {
            config.connect_timeout = parse_secs("DATA_COLLECTION_CONNECT_TIMEOUT_SECS", &secs)?;
        }
        if let Some(flag) = lookup("DATA_COLLECTION_PROXY") {
            config.use_proxy = parse_flag(&flag);
        }
        config.proxy_address = lookup("DATA_COLLECTION_PROXY_ADDR")
            .unwrap_or_else(|| DEFAULT_PROXY_ADDRESS.into());

        Ok(config)
    }

    /// The proxy address to route through, or `None` when the toggle is off.
    pub fn proxy(&self) -> Option<&str> {
        if self.use_proxy {
            Some(self.proxy_address.as_str())
        } else {
            None
        }
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    let secs: u64 = value
        .trim()
        .parse()
        .with_context(|| format!("{} must be a whole number of seconds, got {:?}", key, value))?;
    Ok(Duration::from_secs(secs))
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
