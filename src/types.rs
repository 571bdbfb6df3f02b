// src/types.rs
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use std::fmt::{self, Write as _};

use crate::error::ConfigError;
use crate::policy::PolicyIdentifier;

/// Date format used for the NotBefore column of output rows
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Decoded certificate fields the matcher and the sink consume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub not_before: DateTime<Utc>,
    pub policy_identifiers: Vec<PolicyIdentifier>,
    pub issuer_common_name: String,
    pub subject_common_name: String,
    /// DNS names from the subject alternative name extension
    pub dns_names: Vec<String>,
}

/// Precertificate entry: the decoded TBS certificate plus the issuer key hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Precertificate {
    pub issuer_key_hash: String,
    pub tbs_certificate: Certificate,
}

/// The payload of a CT log entry
#[derive(Debug, Clone)]
pub enum EntryLeaf {
    Certificate(Certificate),
    Precertificate(Precertificate),
}

/// A single decoded CT log entry
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Position of the entry in the log
    pub index: u64,
    /// Timestamp of the Merkle tree leaf (milliseconds since the epoch)
    pub timestamp: u64,
    /// SHA-256 of the certificate (or TBS) DER, hex encoded
    pub fingerprint: String,
    pub leaf: EntryLeaf,
}

impl LogEntry {
    /// The final certificate, if this entry carries one
    pub fn certificate(&self) -> Option<&Certificate> {
        match &self.leaf {
            EntryLeaf::Certificate(cert) => Some(cert),
            EntryLeaf::Precertificate(_) => None,
        }
    }

    pub fn is_precert(&self) -> bool {
        matches!(self.leaf, EntryLeaf::Precertificate(_))
    }
}

/// Reject strftime patterns chrono cannot render
pub fn check_date_format(date_format: &str) -> Result<(), ConfigError> {
    if StrftimeItems::new(date_format).any(|item| matches!(item, Item::Error)) {
        return Err(ConfigError::InvalidDateFormat(date_format.to_string()));
    }
    Ok(())
}

/// One output row derived from a matched certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    pub issuer: String,
    pub not_before: String,
    pub subject: String,
    pub dns_names: Vec<String>,
}

impl MatchRecord {
    /// Build a record, rendering NotBefore with a chrono format string
    pub fn from_certificate(cert: &Certificate, date_format: &str) -> Result<Self, ConfigError> {
        let mut not_before = String::new();
        write!(not_before, "{}", cert.not_before.format(date_format))
            .map_err(|_| ConfigError::InvalidDateFormat(date_format.to_string()))?;

        Ok(Self {
            issuer: cert.issuer_common_name.clone(),
            not_before,
            subject: cert.subject_common_name.clone(),
            dns_names: cert.dns_names.clone(),
        })
    }

    /// Row fields in output order: issuer, date, subject, then DNS names
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        [self.issuer.as_str(), self.not_before.as_str(), self.subject.as_str()]
            .into_iter()
            .chain(self.dns_names.iter().map(String::as_str))
    }
}

impl fmt::Display for MatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[+] EV: {} ({}, issued {})", self.subject, self.issuer, self.not_before)
    }
}
