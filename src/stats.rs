//! Statistics tracking for a log scan

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Thread-safe statistics collector
#[derive(Clone)]
pub struct StatsCollector {
    total_processed: Arc<AtomicU64>,
    certificates: Arc<AtomicU64>,
    precertificates: Arc<AtomicU64>,
    matches_found: Arc<AtomicU64>,
    start_time: Instant,
}

/// Snapshot of statistics at a point in time
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub total_processed: u64,
    pub certificates: u64,
    pub precertificates: u64,
    pub matches_found: u64,
    pub entries_per_second: f64,
    pub uptime_secs: u64,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self {
            total_processed: Arc::new(AtomicU64::new(0)),
            certificates: Arc::new(AtomicU64::new(0)),
            precertificates: Arc::new(AtomicU64::new(0)),
            matches_found: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    /// Count a decoded entry, split by kind
    pub fn increment_processed(&self, is_precert: bool) {
        self.total_processed.fetch_add(1, Ordering::Relaxed);
        if is_precert {
            self.precertificates.fetch_add(1, Ordering::Relaxed);
        } else {
            self.certificates.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn increment_matches(&self) {
        self.matches_found.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current statistics snapshot
    pub fn snapshot(&self) -> StatsSnapshot {
        let elapsed = self.start_time.elapsed();
        let processed = self.total_processed.load(Ordering::Relaxed);

        let rate = if elapsed.as_secs_f64() > 0.0 {
            processed as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        StatsSnapshot {
            total_processed: processed,
            certificates: self.certificates.load(Ordering::Relaxed),
            precertificates: self.precertificates.load(Ordering::Relaxed),
            matches_found: self.matches_found.load(Ordering::Relaxed),
            entries_per_second: rate,
            uptime_secs: elapsed.as_secs(),
        }
    }

    /// Format statistics as a human-readable string
    pub fn format_stats(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            "{} processed ({} certs, {} precerts) | {} matches | {:.0} entries/s | elapsed: {}",
            snapshot.total_processed,
            snapshot.certificates,
            snapshot.precertificates,
            snapshot.matches_found,
            snapshot.entries_per_second,
            Self::format_uptime(snapshot.uptime_secs)
        )
    }

    /// Format uptime duration
    pub fn format_uptime(secs: u64) -> String {
        let hours = secs / 3600;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_collector_new() {
        let snapshot = StatsCollector::new().snapshot();

        assert_eq!(snapshot.total_processed, 0);
        assert_eq!(snapshot.matches_found, 0);
    }

    #[test]
    fn test_increment_processed_by_kind() {
        let stats = StatsCollector::new();

        stats.increment_processed(false);
        stats.increment_processed(false);
        stats.increment_processed(true);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_processed, 3);
        assert_eq!(snapshot.certificates, 2);
        assert_eq!(snapshot.precertificates, 1);
        assert_eq!(snapshot.matches_found, 0);
    }

    #[test]
    fn test_clone_shares_state() {
        let stats1 = StatsCollector::new();
        let stats2 = stats1.clone();

        stats1.increment_matches();
        stats2.increment_matches();

        assert_eq!(stats1.snapshot().matches_found, 2);
        assert_eq!(stats2.snapshot().matches_found, 2);
    }

    #[test]
    fn test_format_stats() {
        let stats = StatsCollector::new();
        stats.increment_processed(false);
        stats.increment_matches();

        let line = stats.format_stats();
        assert!(line.starts_with("1 processed (1 certs, 0 precerts) | 1 matches"));
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(StatsCollector::format_uptime(30), "30s");
        assert_eq!(StatsCollector::format_uptime(90), "1m 30s");
        assert_eq!(StatsCollector::format_uptime(3661), "1h 1m 1s");
    }
}
