// Command-line surface: one positional target URL plus optional overrides
// for the values `UploaderConfig::from_env` loads.

use crate::config::UploaderConfig;
use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

pub const USAGE_HINT: &str = "Please specify some URL and token such as: https://upload.test.com/upload?token=02c8797e-981e-11ee-82f6-674e065a753c";

#[derive(Parser, Debug)]
#[command(name = "data-collection")]
#[command(about = "Upload collected archives to an HTTP endpoint")]
#[command(version)]
pub struct Cli {
    /// Upload endpoint, token included, e.g. https://host/upload?token=<uuid>
    pub url: String,

    /// Directory to scan for archives
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Glob pattern of files to upload
    #[arg(long)]
    pub pattern: Option<String>,

    /// Total transfer timeout per file, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Connection timeout per file, in seconds
    #[arg(long, value_name = "SECS")]
    pub connect_timeout: Option<u64>,

    /// Route uploads through the proxy
    #[arg(long)]
    pub proxy: bool,

    /// Proxy to use with --proxy
    #[arg(long, value_name = "ADDR")]
    pub proxy_address: Option<String>,

    /// Any positional after the URL; its presence means a usage error.
    #[arg(hide = true)]
    pub extra: Vec<String>,
}

/// Outcome of argument parsing.
#[derive(Debug)]
pub enum Invocation {
    Run(Cli),
    /// No URL, or more than one positional argument.
    Usage,
    /// Help, version, or a malformed flag; clap knows how to report these.
    Clap(clap::Error),
}

pub fn parse<I, T>(args: I) -> Invocation
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) if !cli.extra.is_empty() => {
            log::debug!("Unexpected extra arguments: {:?}", cli.extra);
            Invocation::Usage
        }
        Ok(cli) => Invocation::Run(cli),
        Err(err) => match err.kind() {
            ErrorKind::MissingRequiredArgument => {
                log::debug!("Argument error: {}", err);
                Invocation::Usage
            }
            _ => Invocation::Clap(err),
        },
    }
}

impl Cli {
    /// Environment-derived config with this invocation's flags on top.
    pub fn into_config(self) -> Result<UploaderConfig> {
        let base = UploaderConfig::from_env(self.url.clone())?;
        Ok(self.apply(base))
    }

    fn apply(self, config: UploaderConfig) -> UploaderConfig {
        UploaderConfig {
            target_url: self.url,
            directory: self.dir.unwrap_or(config.directory),
            pattern: self.pattern.unwrap_or(config.pattern),
            timeout: self.timeout.map(Duration::from_secs).unwrap_or(config.timeout),
            connect_timeout: self
                .connect_timeout
                .map(Duration::from_secs)
                .unwrap_or(config.connect_timeout),
            use_proxy: self.proxy || config.use_proxy,
            proxy_address: self.proxy_address.unwrap_or(config.proxy_address),
        }
    }
}
