use clap::Parser;

use crate::config::ScanSettings;

/// ev-scan: find Extended Validation certificates in a Certificate Transparency log
///
/// Walks every entry of a CT log, keeps certificates asserting a known EV
/// policy with NotBefore inside the given window, and writes them as CSV rows.
#[derive(Parser, Debug, Clone)]
#[command(name = "ev-scan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    // ===== Input & Configuration =====
    /// CT log to scan (https:// is assumed when no scheme is given)
    /// [default: https://ct.googleapis.com/pilot]
    #[arg(long = "log-url")]
    pub log_url: Option<String>,

    /// Optional TOML config file; flags override its values
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,

    // ===== Output =====
    /// File to write EV certificates to, or - for stdout [default: ev-certs.csv]
    #[arg(short = 'o', long = "csv-file")]
    pub csv_file: Option<String>,

    // ===== Filtering =====
    /// Earliest NotBefore date to accept (YYYY-MM-DD, inclusive)
    #[arg(long = "earliest")]
    pub earliest: Option<String>,

    /// Latest NotBefore date to accept (YYYY-MM-DD, inclusive)
    #[arg(long = "latest")]
    pub latest: Option<String>,

    // ===== Performance =====
    /// Entries requested per get-entries call [default: 1000]
    #[arg(long = "batch-size")]
    pub batch_size: Option<u64>,

    /// Number of matcher workers [default: 100]
    #[arg(long = "workers")]
    pub workers: Option<usize>,

    /// Concurrent get-entries requests [default: 10]
    #[arg(long = "parallel-fetch")]
    pub parallel_fetch: Option<usize>,

    /// First log index to scan [default: 0]
    #[arg(long = "start-index")]
    pub start_index: Option<u64>,

    /// Stop before this log index [default: tree size]
    #[arg(long = "end-index")]
    pub end_index: Option<u64>,

    // ===== Logging =====
    /// Print scanning progress and debug logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Quiet logging (set log level to warn)
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl Cli {
    /// Validate flag combinations and return errors for invalid usage
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.verbose && self.quiet {
            anyhow::bail!("Cannot specify both --verbose and --quiet");
        }

        Ok(())
    }

    /// Override file or default settings with the flags that were given
    pub fn apply_to(&self, settings: &mut ScanSettings) {
        if let Some(ref url) = self.log_url {
            settings.log_url = url.clone();
        }
        if let Some(ref path) = self.csv_file {
            settings.csv_file = path.clone();
        }
        if let Some(ref earliest) = self.earliest {
            settings.earliest = Some(earliest.clone());
        }
        if let Some(ref latest) = self.latest {
            settings.latest = Some(latest.clone());
        }
        if let Some(batch_size) = self.batch_size {
            settings.batch_size = batch_size;
        }
        if let Some(workers) = self.workers {
            settings.workers = workers;
        }
        if let Some(parallel_fetch) = self.parallel_fetch {
            settings.parallel_fetch = parallel_fetch;
        }
        if let Some(start_index) = self.start_index {
            settings.start_index = start_index;
        }
        if self.end_index.is_some() {
            settings.end_index = self.end_index;
        }
    }

    /// Scanner progress is only shown in verbose mode
    pub fn scanner_quiet(&self) -> bool {
        !self.verbose
    }

    /// Determine log level based on verbose/quiet flags
    pub fn log_level<'a>(&self, configured: &'a str) -> &'a str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            configured
        }
    }
}
