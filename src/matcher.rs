// src/matcher.rs
//! Certificate matchers used by the log scanner
//!
//! A matcher is a pure predicate over decoded log entries. Implementations
//! hold only immutable data so one instance can be shared by every worker.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::ConfigError;
use crate::policy::is_ev_policy;
use crate::types::{Certificate, Precertificate};

/// Decides which log entries are reported as matches
pub trait Matcher: Send + Sync {
    /// Whether a final certificate entry matches
    fn certificate_matches(&self, cert: &Certificate) -> bool;

    /// Whether a precertificate entry matches
    fn precertificate_matches(&self, precert: &Precertificate) -> bool;
}

/// Inclusive issuance window; `None` leaves that side unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}

impl DateWindow {
    pub fn new(earliest: Option<DateTime<Utc>>, latest: Option<DateTime<Utc>>) -> Self {
        Self { earliest, latest }
    }

    /// Window with neither bound set
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Parse `YYYY-MM-DD` bounds; each date means midnight UTC of that day.
    /// Absent or empty strings leave the side unbounded.
    pub fn parse(earliest: Option<&str>, latest: Option<&str>) -> Result<Self, ConfigError> {
        Ok(Self {
            earliest: parse_bound("earliest", earliest)?,
            latest: parse_bound("latest", latest)?,
        })
    }

    pub fn is_unbounded(&self) -> bool {
        self.earliest.is_none() && self.latest.is_none()
    }

    /// Check a timestamp against both bounds (inclusive)
    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        if let Some(earliest) = self.earliest {
            if *ts < earliest {
                return false;
            }
        }
        if let Some(latest) = self.latest {
            if *ts > latest {
                return false;
            }
        }
        true
    }
}

fn parse_bound(field: &'static str, value: Option<&str>) -> Result<Option<DateTime<Utc>>, ConfigError> {
    let value = match value.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => return Ok(None),
    };

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|source| {
        ConfigError::InvalidDate {
            field,
            value: value.to_string(),
            source,
        }
    })?;

    Ok(Some(date.and_time(chrono::NaiveTime::MIN).and_utc()))
}

/// Matches certificates issued under a known EV policy inside a date window
#[derive(Debug, Clone, Default)]
pub struct EvMatcher {
    window: DateWindow,
}

impl EvMatcher {
    pub fn new(window: DateWindow) -> Self {
        Self { window }
    }

    /// Build a matcher from raw `YYYY-MM-DD` bounds
    pub fn from_bounds(earliest: Option<&str>, latest: Option<&str>) -> Result<Self, ConfigError> {
        Ok(Self::new(DateWindow::parse(earliest, latest)?))
    }

    pub fn window(&self) -> &DateWindow {
        &self.window
    }
}

impl Matcher for EvMatcher {
    fn certificate_matches(&self, cert: &Certificate) -> bool {
        if !self.window.contains(&cert.not_before) {
            return false;
        }

        cert.policy_identifiers.iter().any(is_ev_policy)
    }

    /// Precert policy assertions are not treated as authoritative
    fn precertificate_matches(&self, _precert: &Precertificate) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{EV_POLICY_OIDS, PolicyIdentifier};
    use chrono::TimeZone;

    fn cert(not_before: DateTime<Utc>, policies: &[&str]) -> Certificate {
        Certificate {
            not_before,
            policy_identifiers: policies.iter().map(|p| p.parse().unwrap()).collect(),
            issuer_common_name: "Test EV CA".to_string(),
            subject_common_name: "example.com".to_string(),
            dns_names: vec!["example.com".to_string()],
        }
    }

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    const EV_OID: &str = "1.3.6.1.4.1.34697.2.1";
    const DV_OID: &str = "2.23.140.1.2.1";

    fn window_2015() -> EvMatcher {
        EvMatcher::from_bounds(Some("2015-01-01"), Some("2016-01-01")).unwrap()
    }

    #[test]
    fn test_matches_inside_window() {
        let matcher = window_2015();
        assert!(matcher.certificate_matches(&cert(day(2015, 6, 1), &[EV_OID])));
    }

    #[test]
    fn test_rejects_before_window() {
        let matcher = window_2015();
        assert!(!matcher.certificate_matches(&cert(day(2014, 12, 31), &[EV_OID])));
    }

    #[test]
    fn test_rejects_after_window() {
        let matcher = window_2015();
        let late = Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 1).unwrap();
        assert!(!matcher.certificate_matches(&cert(late, &[EV_OID])));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let matcher = window_2015();
        assert!(matcher.certificate_matches(&cert(day(2015, 1, 1), &[EV_OID])));
        assert!(matcher.certificate_matches(&cert(day(2016, 1, 1), &[EV_OID])));
        // At the boundary the policy stage still decides
        assert!(!matcher.certificate_matches(&cert(day(2015, 1, 1), &[DV_OID])));
    }

    #[test]
    fn test_no_policies_never_match() {
        assert!(!window_2015().certificate_matches(&cert(day(2015, 6, 1), &[])));
        assert!(!EvMatcher::default().certificate_matches(&cert(day(2015, 6, 1), &[])));
    }

    #[test]
    fn test_unbounded_window_is_policy_only() {
        let matcher = EvMatcher::new(DateWindow::unbounded());
        assert!(matcher.window().is_unbounded());

        assert!(matcher.certificate_matches(&cert(day(1990, 1, 1), &[EV_OID])));
        assert!(matcher.certificate_matches(&cert(day(2099, 1, 1), &[EV_OID])));
        assert!(!matcher.certificate_matches(&cert(day(2015, 6, 1), &[DV_OID])));
    }

    #[test]
    fn test_single_sided_windows() {
        let from = EvMatcher::from_bounds(Some("2015-01-01"), None).unwrap();
        assert!(!from.certificate_matches(&cert(day(2014, 1, 1), &[EV_OID])));
        assert!(from.certificate_matches(&cert(day(2030, 1, 1), &[EV_OID])));

        let until = EvMatcher::from_bounds(None, Some("2016-01-01")).unwrap();
        assert!(until.certificate_matches(&cert(day(2001, 1, 1), &[EV_OID])));
        assert!(!until.certificate_matches(&cert(day(2016, 1, 2), &[EV_OID])));
    }

    #[test]
    fn test_every_table_entry_matches() {
        let matcher = EvMatcher::default();
        for arcs in EV_POLICY_OIDS {
            let mut c = cert(day(2015, 6, 1), &[]);
            c.policy_identifiers = vec![PolicyIdentifier::from(*arcs)];
            assert!(matcher.certificate_matches(&c), "expected match for {:?}", arcs);
        }
    }

    #[test]
    fn test_any_ev_policy_is_enough() {
        let matcher = window_2015();
        let c = cert(day(2015, 6, 1), &[DV_OID, "2.5.29.32.0", "2.16.840.1.114412.2.1"]);
        assert!(matcher.certificate_matches(&c));
    }

    #[test]
    fn test_inverted_window_matches_nothing() {
        let matcher = EvMatcher::from_bounds(Some("2016-01-01"), Some("2015-01-01")).unwrap();
        assert!(!matcher.certificate_matches(&cert(day(2015, 6, 1), &[EV_OID])));
        assert!(!matcher.certificate_matches(&cert(day(2016, 1, 1), &[EV_OID])));
    }

    #[test]
    fn test_deterministic() {
        let matcher = window_2015();
        let c = cert(day(2015, 6, 1), &[EV_OID]);
        let first = matcher.certificate_matches(&c);
        for _ in 0..100 {
            assert_eq!(matcher.certificate_matches(&c), first);
        }
    }

    #[test]
    fn test_precertificates_never_match() {
        let matcher = EvMatcher::default();
        let precert = Precertificate {
            issuer_key_hash: "ab".repeat(32),
            tbs_certificate: cert(day(2015, 6, 1), &[EV_OID]),
        };
        assert!(!matcher.precertificate_matches(&precert));
        assert!(!window_2015().precertificate_matches(&precert));
    }

    #[test]
    fn test_window_parse() {
        let window = DateWindow::parse(Some("2015-01-01"), Some("")).unwrap();
        assert_eq!(window.earliest, Some(day(2015, 1, 1)));
        assert_eq!(window.latest, None);

        assert!(DateWindow::parse(None, None).unwrap().is_unbounded());
    }

    #[test]
    fn test_window_parse_rejects_bad_dates() {
        for bad in ["2015-13-01", "2015/01/01", "yesterday", "2015-02-30"] {
            let err = DateWindow::parse(Some(bad), None).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidDate { field: "earliest", .. }));
        }

        let err = DateWindow::parse(None, Some("01-01-2016")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDate { field: "latest", .. }));
    }

    #[test]
    fn test_matcher_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EvMatcher>();

        let shared: std::sync::Arc<dyn Matcher> = std::sync::Arc::new(window_2015());
        let c = cert(day(2015, 6, 1), &[EV_OID]);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let m = shared.clone();
                let c = c.clone();
                std::thread::spawn(move || m.certificate_matches(&c))
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
    }
}
