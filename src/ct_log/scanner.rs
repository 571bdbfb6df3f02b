// src/ct_log/scanner.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use super::client::CtLogClient;
use super::types::RawLogEntry;
use crate::cert_parser::CertificateParser;
use crate::matcher::Matcher;
use crate::progress::ProgressIndicator;
use crate::stats::StatsCollector;
use crate::types::{EntryLeaf, LogEntry};

/// Upper bound on entries queued between the fetcher and the workers
const MAX_QUEUED_ENTRIES: usize = 10_000;

/// Callback invoked with a decoded log entry
pub type EntryCallback = Arc<dyn Fn(&LogEntry) + Send + Sync>;

/// Callback that ignores every entry
pub fn noop_callback() -> EntryCallback {
    Arc::new(|_: &LogEntry| {})
}

/// Tuning for a log scan
#[derive(Debug, Clone)]
pub struct ScannerOptions {
    /// Entries requested per get-entries call
    pub batch_size: u64,
    /// Tasks decoding and matching entries
    pub num_workers: usize,
    /// Concurrent get-entries requests
    pub parallel_fetch: usize,
    pub start_index: u64,
    /// Exclusive upper bound; defaults to the tree size
    pub end_index: Option<u64>,
    /// Suppress progress output
    pub quiet: bool,
}

impl Default for ScannerOptions {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            num_workers: 100,
            parallel_fetch: 10,
            start_index: 0,
            end_index: None,
            quiet: true,
        }
    }
}

/// Totals for a completed scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub tree_size: u64,
    pub entries_processed: u64,
    pub certificates: u64,
    pub precertificates: u64,
    pub matches: u64,
}

/// Walks a CT log and reports each entry to one of two callbacks
#[async_trait]
pub trait LogScanner: Send + Sync {
    /// Scan the log; `on_match` receives entries the matcher accepts and
    /// `on_miss` everything else. Any fetch or decode failure ends the scan.
    async fn scan(
        &self,
        matcher: Arc<dyn Matcher>,
        on_match: EntryCallback,
        on_miss: EntryCallback,
    ) -> Result<ScanSummary>;
}

/// Concurrent scanner over a single CT log
pub struct Scanner {
    client: Arc<CtLogClient>,
    options: ScannerOptions,
}

type EntryReceiver = Arc<Mutex<mpsc::Receiver<(u64, RawLogEntry)>>>;

impl Scanner {
    pub fn new(client: CtLogClient, options: ScannerOptions) -> Self {
        Self {
            client: Arc::new(client),
            options,
        }
    }

    pub fn options(&self) -> &ScannerOptions {
        &self.options
    }

    fn show_progress(&self) -> bool {
        use is_terminal::IsTerminal;
        !self.options.quiet && std::io::stderr().is_terminal()
    }
}

#[async_trait]
impl LogScanner for Scanner {
    async fn scan(
        &self,
        matcher: Arc<dyn Matcher>,
        on_match: EntryCallback,
        on_miss: EntryCallback,
    ) -> Result<ScanSummary> {
        let sth = self
            .client
            .get_sth_with_retry()
            .await
            .context("Failed to get STH")?;

        let start = self.options.start_index;
        let end = self
            .options
            .end_index
            .map_or(sth.tree_size, |e| e.min(sth.tree_size));

        info!(
            "{}: tree_size={}, scanning entries {}..{}",
            self.client.base_url(),
            sth.tree_size,
            start,
            end
        );

        if start >= end {
            info!("Nothing to scan");
            return Ok(ScanSummary {
                tree_size: sth.tree_size,
                ..Default::default()
            });
        }

        let stats = StatsCollector::new();
        let progress = ProgressIndicator::new(self.show_progress(), end - start);

        let (entry_tx, entry_rx) = mpsc::channel(queue_capacity(self.options.batch_size));
        let entry_rx: EntryReceiver = Arc::new(Mutex::new(entry_rx));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shutdown_tx = Arc::new(shutdown_tx);

        let mut workers = JoinSet::new();
        for id in 0..self.options.num_workers.max(1) {
            workers.spawn(run_worker(
                id,
                Arc::clone(&entry_rx),
                Arc::clone(&matcher),
                Arc::clone(&on_match),
                Arc::clone(&on_miss),
                stats.clone(),
                progress.clone(),
                Arc::clone(&shutdown_tx),
            ));
        }
        drop(entry_rx);

        let reporter = (!self.options.quiet).then(|| {
            let stats = stats.clone();
            let progress = progress.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(10));
                interval.tick().await;
                loop {
                    interval.tick().await;
                    if progress.is_enabled() {
                        progress.set_message(format!("{} matches", stats.snapshot().matches_found));
                    } else {
                        info!("{}", stats.format_stats());
                    }
                }
            })
        });

        let fetch_result = self
            .fetch_all(start, end, entry_tx, shutdown_rx)
            .await;

        let mut worker_error = None;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    worker_error.get_or_insert(e);
                }
                Err(e) => {
                    worker_error.get_or_insert(anyhow::anyhow!("Worker task failed: {}", e));
                }
            }
        }

        if let Some(handle) = reporter {
            handle.abort();
        }
        progress.finish();

        // A decode failure stops fetching, so report it first
        if let Some(e) = worker_error {
            return Err(e);
        }
        fetch_result?;

        let snapshot = stats.snapshot();
        info!("Scan complete: {}", stats.format_stats());

        Ok(ScanSummary {
            tree_size: sth.tree_size,
            entries_processed: snapshot.total_processed,
            certificates: snapshot.certificates,
            precertificates: snapshot.precertificates,
            matches: snapshot.matches_found,
        })
    }
}

impl Scanner {
    /// Fetch `[start, end)` in batches and feed entries to the workers
    async fn fetch_all(
        &self,
        start: u64,
        end: u64,
        entry_tx: mpsc::Sender<(u64, RawLogEntry)>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<()> {
        let ranges = batch_ranges(start, end, self.options.batch_size);
        debug!("Fetching {} batches", ranges.len());

        let mut batches = stream::iter(ranges)
            .map(|(first, last)| {
                let client = Arc::clone(&self.client);
                async move { fetch_range(&client, first, last).await }
            })
            .buffer_unordered(self.options.parallel_fetch.max(1));

        'batches: while let Some(batch) = batches.next().await {
            if *shutdown_rx.borrow() {
                debug!("Worker failure, stopping fetch");
                break;
            }

            for item in batch? {
                if entry_tx.send(item).await.is_err() {
                    // Every worker has exited
                    break 'batches;
                }
            }
        }

        Ok(())
    }
}

/// Split `[start, end)` into inclusive ranges of at most `batch_size` entries
fn batch_ranges(start: u64, end: u64, batch_size: u64) -> Vec<(u64, u64)> {
    let batch_size = batch_size.max(1);
    let mut ranges = Vec::new();
    let mut first = start;

    while first < end {
        let last = first.saturating_add(batch_size).min(end) - 1;
        ranges.push((first, last));
        first = last + 1;
    }

    ranges
}

/// Channel capacity for one batch of entries, kept within tokio's limits
fn queue_capacity(batch_size: u64) -> usize {
    usize::try_from(batch_size)
        .unwrap_or(usize::MAX)
        .clamp(1, MAX_QUEUED_ENTRIES)
}

/// Fetch an inclusive range, re-requesting when the log returns a short page
async fn fetch_range(client: &CtLogClient, first: u64, last: u64) -> Result<Vec<(u64, RawLogEntry)>> {
    let mut out = Vec::with_capacity((last - first + 1) as usize);
    let mut next = first;

    while next <= last {
        let entries = client
            .get_entries_with_retry(next, last)
            .await
            .with_context(|| format!("Failed to get entries {}-{}", next, last))?;

        if entries.is_empty() {
            anyhow::bail!("Log returned no entries for range {}-{}", next, last);
        }

        let wanted = (last - next + 1) as usize;
        for entry in entries.into_iter().take(wanted) {
            out.push((next, entry));
            next += 1;
        }
    }

    Ok(out)
}

#[allow(clippy::too_many_arguments)]
async fn run_worker(
    id: usize,
    entry_rx: EntryReceiver,
    matcher: Arc<dyn Matcher>,
    on_match: EntryCallback,
    on_miss: EntryCallback,
    stats: StatsCollector,
    progress: ProgressIndicator,
    shutdown_tx: Arc<watch::Sender<bool>>,
) -> Result<()> {
    loop {
        let next = { entry_rx.lock().await.recv().await };
        let Some((index, raw)) = next else {
            break;
        };

        let entry = match CertificateParser::parse_log_entry(index, &raw) {
            Ok(entry) => entry,
            Err(e) => {
                error!("Worker {}: failed to decode entry {}: {}", id, index, e);
                let _ = shutdown_tx.send(true);
                return Err(e.context(format!("Failed to decode log entry {}", index)));
            }
        };

        stats.increment_processed(entry.is_precert());

        let matched = match &entry.leaf {
            EntryLeaf::Certificate(cert) => matcher.certificate_matches(cert),
            EntryLeaf::Precertificate(precert) => matcher.precertificate_matches(precert),
        };

        if matched {
            stats.increment_matches();
            progress.suspend(|| on_match(&entry));
        } else {
            on_miss(&entry);
        }

        progress.inc(1);
    }

    debug!("Worker {} finished", id);
    Ok(())
}
