// src/error.rs
//! Error types for configuration and result recording
//!
//! Configuration errors are fatal and surface before any scanning begins.
//! Sink errors are reported per record and never stop a scan on their own.

use std::path::PathBuf;
use thiserror::Error;

/// Invalid user-supplied configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A date bound did not parse as `YYYY-MM-DD`
    #[error("invalid {field} date '{value}' (expected YYYY-MM-DD): {source}")]
    InvalidDate {
        field: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("invalid log URL '{value}': {source}")]
    InvalidLogUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported log URL scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),

    /// A scanner tuning value was out of range
    #[error("invalid {name}: {reason}")]
    InvalidTuning { name: &'static str, reason: String },

    /// A strftime pattern for output dates was not understood
    #[error("invalid date format '{0}'")]
    InvalidDateFormat(String),

    #[error("failed to load config file {path}: {reason}")]
    ConfigFile { path: PathBuf, reason: String },

    /// The output destination could not be opened
    #[error("cannot use output destination: {0}")]
    Output(#[from] SinkError),
}

/// Failure while opening, writing or flushing the result sink
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("failed to create {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode record: {0}")]
    Encode(#[from] csv::Error),

    #[error("failed to write record: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to flush output: {0}")]
    Flush(#[source] std::io::Error),

    #[error("result sink is already closed")]
    Closed,
}
