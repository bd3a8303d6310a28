//! Settings resolution.
//!
//! Sources are merged from lowest to highest precedence: built-in defaults,
//! the optional `.webget.yaml` file, `WEBGET_*` environment variables and
//! command-line flags. Environment variables are handled by clap, which only
//! consults a variable when its flag is absent.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, ValueEnum};
use reqwest::Url;
use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_CONFIG_FILE: &str = ".webget.yaml";

const DEFAULT_SCHEMA: &str = "https";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_VERBOSITY: u8 = 1;

/// Accepted content format, sent as the `Accept` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Html,
    Json,
    Text,
}

impl Format {
    pub fn media_type(self) -> &'static str {
        match self {
            Format::Html => "text/html",
            Format::Json => "application/json",
            Format::Text => "text/plain",
        }
    }
}

/// Fetch a URL and print the body or save it to a file
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "webget", version, about, long_about = None, disable_help_flag = true)]
pub struct Cli {
    /// User-Agent string
    #[arg(short, long, env = "WEBGET_CLIENT")]
    pub client: Option<String>,

    /// Target URL, the scheme is optional
    #[arg(short = 'h', long, env = "WEBGET_HOST")]
    pub host: Option<String>,

    /// Accepted format
    #[arg(short, long, env = "WEBGET_FORMAT", value_enum)]
    pub format: Option<Format>,

    /// Save the body to this file instead of printing it
    #[arg(short, long, env = "WEBGET_OUTPUT", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Scheme used when the host has none (http or https)
    #[arg(short, long, env = "WEBGET_SCHEMA")]
    pub schema: Option<String>,

    /// Request timeout in milliseconds, ignored when saving to a file
    #[arg(short, long, env = "WEBGET_TIMEOUT", value_name = "MS")]
    pub timeout: Option<u64>,

    /// Accept invalid TLS certificates
    #[arg(
        short,
        long,
        env = "WEBGET_UNSECURE",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub unsecure: Option<bool>,

    /// 0 silent, 1 progress bar, 2 info, 3 debug
    #[arg(short, long, env = "WEBGET_VERBOSITY", value_name = "LEVEL")]
    pub verbosity: Option<u8>,

    /// Config file to load instead of ./.webget.yaml
    #[arg(long, env = "WEBGET_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    pub help: Option<bool>,
}

/// Contents of the YAML config file. Every key is optional.
#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub client: Option<String>,
    pub host: Option<String>,
    pub format: Option<Format>,
    pub output: Option<PathBuf>,
    pub schema: Option<String>,
    pub timeout: Option<u64>,
    pub unsecure: Option<bool>,
    pub verbosity: Option<u8>,
}

impl FileConfig {
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| Error::config(format!("invalid YAML config: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_yaml(&content).map_err(|e| match e {
            Error::Config(msg) => Error::config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    /// Like [`FileConfig::load`], but a missing file yields the empty config.
    pub fn load_optional(path: &Path) -> Result<Self> {
        match fs::metadata(path) {
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            _ => Self::load(path),
        }
    }
}

/// Fully resolved, immutable settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub client: String,
    pub url: Url,
    pub format: Format,
    pub output: Option<PathBuf>,
    pub timeout: Duration,
    pub unsecure: bool,
    pub verbosity: u8,
}

impl Settings {
    /// Load the config file named by `--config` (or the default one, if it
    /// exists) and merge it under the command line.
    pub fn resolve(cli: Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::load_optional(Path::new(DEFAULT_CONFIG_FILE))?,
        };
        Self::merge(cli, file)
    }

    pub fn merge(cli: Cli, file: FileConfig) -> Result<Self> {
        let host = cli
            .host
            .or(file.host)
            .ok_or_else(|| Error::config("host url is required (--host or WEBGET_HOST)"))?;
        let schema = normalize_schema(
            cli.schema
                .as_deref()
                .or(file.schema.as_deref())
                .unwrap_or(DEFAULT_SCHEMA),
        )?;
        let url = resolve_url(&host, schema)?;

        let output = cli
            .output
            .or(file.output)
            .filter(|p| !p.as_os_str().is_empty());

        Ok(Settings {
            client: cli.client.or(file.client).unwrap_or_default(),
            url,
            format: cli.format.or(file.format).unwrap_or_default(),
            output,
            timeout: Duration::from_millis(
                cli.timeout.or(file.timeout).unwrap_or(DEFAULT_TIMEOUT_MS),
            ),
            unsecure: cli.unsecure.or(file.unsecure).unwrap_or(false),
            verbosity: cli.verbosity.or(file.verbosity).unwrap_or(DEFAULT_VERBOSITY),
        })
    }

    /// Timeout for the whole request, or `None` when downloading to a file
    /// (or when the configured timeout is zero).
    pub fn request_timeout(&self) -> Option<Duration> {
        if self.output.is_some() || self.timeout.is_zero() {
            None
        } else {
            Some(self.timeout)
        }
    }

    pub fn show_progress(&self) -> bool {
        self.verbosity >= 1
    }

    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbosity {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Warn,
            2 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        }
    }
}

fn normalize_schema(schema: &str) -> Result<&'static str> {
    match schema
        .trim()
        .trim_end_matches("://")
        .to_ascii_lowercase()
        .as_str()
    {
        "http" => Ok("http"),
        "https" => Ok("https"),
        other => Err(Error::config(format!(
            "unsupported schema {other:?}, expected http or https"
        ))),
    }
}

/// Prefix `host` with `schema://` unless it already names http or https.
pub fn resolve_url(host: &str, schema: &str) -> Result<Url> {
    let host = host.trim();
    if host.is_empty() {
        return Err(Error::config("host url is empty"));
    }

    let lower = host.to_ascii_lowercase();
    let full = if lower.starts_with("http://") || lower.starts_with("https://") {
        host.to_owned()
    } else {
        format!("{schema}://{host}")
    };

    Url::parse(&full).map_err(|e| Error::config(format!("invalid host url {full:?}: {e}")))
}
