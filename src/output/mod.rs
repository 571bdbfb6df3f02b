//! Output destinations for matched certificates
//!
//! Matches are written as flat CSV rows through a [`ResultSink`], which also
//! keeps the running match count reported when the scan finishes.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::ct_log::EntryCallback;
use crate::error::ConfigError;
use crate::types::{LogEntry, MatchRecord, check_date_format};

pub mod csv;

pub use self::csv::ResultSink;

/// Where matched rows are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Create (or truncate) a file at this path
    File(PathBuf),
    /// Standard output
    Console,
}

impl OutputTarget {
    /// Interpret a command-line destination; `-` selects standard output
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            OutputTarget::Console
        } else {
            OutputTarget::File(PathBuf::from(arg))
        }
    }

    pub fn is_console(&self) -> bool {
        matches!(self, OutputTarget::Console)
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputTarget::File(path) => write!(f, "{}", path.display()),
            OutputTarget::Console => write!(f, "<stdout>"),
        }
    }
}

/// Callback that records each matched certificate in `sink`.
///
/// The date format is checked here, once. Write failures are logged with the
/// entry's details and do not stop the scan.
pub fn sink_callback(
    sink: Arc<ResultSink>,
    date_format: &'static str,
) -> Result<EntryCallback, ConfigError> {
    check_date_format(date_format)?;

    Ok(Arc::new(move |entry: &LogEntry| {
        let Some(cert) = entry.certificate() else {
            return;
        };

        let record = match MatchRecord::from_certificate(cert, date_format) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Failed to render entry {}: {}", entry.index, e);
                return;
            }
        };
        tracing::debug!("{}", record);

        if let Err(e) = sink.record_match(&record) {
            tracing::warn!(
                "Failed to record entry {} (subject '{}', issuer '{}', sha256 {}): {}",
                entry.index,
                record.subject,
                record.issuer,
                entry.fingerprint,
                e
            );
        }
    }))
}
