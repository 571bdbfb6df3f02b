// src/config.rs
//! Scan settings: built-in defaults, optional TOML file, and validation
//!
//! Raw strings from the file and the command line are only turned into
//! typed values by [`ScanSettings::validate`]. Any failure there is fatal and
//! happens before the sink or the scanner exist.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use url::Url;

use crate::ct_log::ScannerOptions;
use crate::error::ConfigError;
use crate::matcher::DateWindow;
use crate::output::{OutputTarget, ResultSink};

pub const DEFAULT_LOG_URL: &str = "https://ct.googleapis.com/pilot";
pub const DEFAULT_CSV_FILE: &str = "ev-certs.csv";

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ScanSettings {
    pub log_url: String,
    /// Output path, or `-` for standard output
    pub csv_file: String,
    pub earliest: Option<String>,
    pub latest: Option<String>,
    pub batch_size: u64,
    pub workers: usize,
    pub parallel_fetch: usize,
    pub start_index: u64,
    pub end_index: Option<u64>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            log_url: DEFAULT_LOG_URL.to_string(),
            csv_file: DEFAULT_CSV_FILE.to_string(),
            earliest: None,
            latest: None,
            batch_size: 1000,
            workers: 100,
            parallel_fetch: 10,
            start_index: 0,
            end_index: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Settings after validation, ready to build the sink and scanner
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub log_url: Url,
    pub window: DateWindow,
    pub output: OutputTarget,
    pub scanner: ScannerOptions,
}

impl ValidatedConfig {
    /// Open the output destination; failure is a configuration error
    pub fn open_sink(&self) -> Result<ResultSink, ConfigError> {
        Ok(ResultSink::open(&self.output)?)
    }
}

impl ScanSettings {
    pub fn validate(&self, quiet: bool) -> Result<ValidatedConfig, ConfigError> {
        let log_url = parse_log_url(&self.log_url)?;
        let window = DateWindow::parse(self.earliest.as_deref(), self.latest.as_deref())?;

        if self.csv_file.trim().is_empty() {
            return Err(ConfigError::InvalidTuning {
                name: "csv_file",
                reason: "must not be empty".to_string(),
            });
        }
        let output = OutputTarget::from_arg(&self.csv_file);

        check_positive("batch_size", self.batch_size)?;
        check_positive("workers", self.workers as u64)?;
        check_positive("parallel_fetch", self.parallel_fetch as u64)?;

        if let Some(end) = self.end_index {
            if end <= self.start_index {
                return Err(ConfigError::InvalidTuning {
                    name: "end_index",
                    reason: format!("{} must be greater than start_index {}", end, self.start_index),
                });
            }
        }

        Ok(ValidatedConfig {
            log_url,
            window,
            output,
            scanner: ScannerOptions {
                batch_size: self.batch_size,
                num_workers: self.workers,
                parallel_fetch: self.parallel_fetch,
                start_index: self.start_index,
                end_index: self.end_index,
                quiet,
            },
        })
    }
}

fn check_positive(name: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidTuning {
            name,
            reason: "must be greater than 0".to_string(),
        });
    }
    Ok(())
}

/// Parse a log URL, defaulting to https when no scheme is given
pub fn parse_log_url(raw: &str) -> Result<Url, ConfigError> {
    let raw = raw.trim();
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };

    let url = Url::parse(&with_scheme).map_err(|source| ConfigError::InvalidLogUrl {
        value: raw.to_string(),
        source,
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
}
