// src/run.rs
//! Wiring of matcher, scanner and sink for one scan

use anyhow::Context;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::ValidatedConfig;
use crate::ct_log::{LogScanner, ScanSummary, noop_callback};
use crate::matcher::{EvMatcher, Matcher};
use crate::output::sink_callback;
use crate::types::DEFAULT_DATE_FORMAT;

/// Result of a completed scan
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// Rows durably written to the output
    pub recorded: u64,
    pub summary: ScanSummary,
}

/// Open the output, scan the log for EV certificates and flush the results.
///
/// The output is opened before the scanner is called, so an unusable
/// destination fails with a [`crate::error::ConfigError`] without any log
/// traffic.
pub async fn run_scan(config: &ValidatedConfig, scanner: &dyn LogScanner) -> anyhow::Result<ScanReport> {
    let sink = Arc::new(config.open_sink().inspect_err(|e| {
        error!("Invalid configuration: {}", e);
    })?);
    info!("Writing EV certificates to {}", config.output);

    let matcher: Arc<dyn Matcher> = Arc::new(EvMatcher::new(config.window));
    let on_match = sink_callback(Arc::clone(&sink), DEFAULT_DATE_FORMAT)?;

    info!("Scanning {} for EV certs...", config.log_url);

    let summary = scanner
        .scan(matcher, on_match, noop_callback())
        .await
        .inspect_err(|e| error!("Scan failed: {:#}", e))
        .with_context(|| format!("Scan of {} failed", config.log_url))?;

    // Flush everything before reporting the count
    let recorded = sink.close().context("Failed to flush results")?;

    if recorded != summary.matches {
        warn!(
            "{} matches found but only {} recorded; see earlier write errors",
            summary.matches, recorded
        );
    }

    info!(
        "Processed {} entries ({} certificates, {} precertificates) of {}",
        summary.entries_processed, summary.certificates, summary.precertificates, summary.tree_size
    );

    Ok(ScanReport { recorded, summary })
}
