// src/cert_parser.rs
use anyhow::{Context, Result};
use base64::Engine;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use x509_parser::extensions::ParsedExtension;
use x509_parser::prelude::*;

use crate::ct_log::types::RawLogEntry;
use crate::policy::PolicyIdentifier;
use crate::types::{Certificate, EntryLeaf, LogEntry, Precertificate};

/// MerkleTreeLeaf header: version, leaf type, timestamp, entry type
const LEAF_HEADER_LEN: usize = 12;
const ISSUER_KEY_HASH_LEN: usize = 32;

const ENTRY_TYPE_X509: u16 = 0;
const ENTRY_TYPE_PRECERT: u16 = 1;

/// Decoder from raw CT log entries to the certificate fields the scanner needs
pub struct CertificateParser;

impl CertificateParser {
    /// Decode a get-entries item at `index` (RFC 6962 MerkleTreeLeaf)
    pub fn parse_log_entry(index: u64, raw: &RawLogEntry) -> Result<LogEntry> {
        let leaf_bytes = base64::engine::general_purpose::STANDARD
            .decode(&raw.leaf_input)
            .context("Failed to decode base64 leaf_input")?;

        if leaf_bytes.len() < LEAF_HEADER_LEN {
            anyhow::bail!("Leaf input too short: {} bytes", leaf_bytes.len());
        }

        if leaf_bytes[0] != 0 {
            anyhow::bail!("Unsupported leaf version: {}", leaf_bytes[0]);
        }
        if leaf_bytes[1] != 0 {
            anyhow::bail!("Unsupported leaf type: {}", leaf_bytes[1]);
        }

        let mut ts = [0u8; 8];
        ts.copy_from_slice(&leaf_bytes[2..10]);
        let timestamp = u64::from_be_bytes(ts);

        let entry_type = ((leaf_bytes[10] as u16) << 8) | (leaf_bytes[11] as u16);
        let body = &leaf_bytes[LEAF_HEADER_LEN..];

        let (fingerprint, leaf) = match entry_type {
            ENTRY_TYPE_X509 => {
                let cert_der = read_u24_prefixed(body).context("Malformed x509_entry")?;
                let (_, cert) = X509Certificate::from_der(cert_der)
                    .map_err(|e| anyhow::anyhow!("Failed to parse X.509 certificate: {:?}", e))?;

                (
                    Self::fingerprint(cert_der),
                    EntryLeaf::Certificate(Self::extract_fields(&cert.tbs_certificate)?),
                )
            }
            ENTRY_TYPE_PRECERT => {
                if body.len() < ISSUER_KEY_HASH_LEN {
                    anyhow::bail!("precert_entry too short for issuer key hash");
                }
                let issuer_key_hash = hex::encode(&body[..ISSUER_KEY_HASH_LEN]);

                let tbs_der = read_u24_prefixed(&body[ISSUER_KEY_HASH_LEN..])
                    .context("Malformed precert_entry")?;
                let (_, tbs) = TbsCertificate::from_der(tbs_der)
                    .map_err(|e| anyhow::anyhow!("Failed to parse precertificate TBS: {:?}", e))?;

                (
                    Self::fingerprint(tbs_der),
                    EntryLeaf::Precertificate(Precertificate {
                        issuer_key_hash,
                        tbs_certificate: Self::extract_fields(&tbs)?,
                    }),
                )
            }
            other => anyhow::bail!("Unknown entry type: {}", other),
        };

        Ok(LogEntry {
            index,
            timestamp,
            fingerprint,
            leaf,
        })
    }

    /// Parse a standalone DER certificate
    pub fn parse_der(der: &[u8]) -> Result<Certificate> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| anyhow::anyhow!("Failed to parse X.509 certificate: {:?}", e))?;
        Self::extract_fields(&cert.tbs_certificate)
    }

    fn fingerprint(der: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(der);
        hex::encode(hasher.finalize())
    }

    fn extract_fields(tbs: &TbsCertificate) -> Result<Certificate> {
        let not_before_ts = tbs.validity().not_before.timestamp();
        let not_before = DateTime::<Utc>::from_timestamp(not_before_ts, 0)
            .with_context(|| format!("NotBefore out of range: {}", not_before_ts))?;

        let mut dns_names = Vec::new();
        let mut policy_identifiers = Vec::new();

        for ext in tbs.extensions() {
            match ext.parsed_extension() {
                ParsedExtension::SubjectAlternativeName(san) => {
                    for general_name in &san.general_names {
                        if let GeneralName::DNSName(dns_name) = general_name {
                            dns_names.push(dns_name.to_string());
                        }
                    }
                }
                ParsedExtension::CertificatePolicies(policies) => {
                    for policy in policies.iter() {
                        let dotted = policy.policy_id.to_id_string();
                        match dotted.parse::<PolicyIdentifier>() {
                            Ok(oid) => policy_identifiers.push(oid),
                            Err(e) => tracing::debug!("Skipping policy identifier: {}", e),
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(Certificate {
            not_before,
            policy_identifiers,
            issuer_common_name: Self::common_name(tbs.issuer()),
            subject_common_name: Self::common_name(tbs.subject()),
            dns_names,
        })
    }

    /// First common name attribute, or an empty string
    fn common_name(name: &X509Name) -> String {
        name.iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .unwrap_or_default()
            .to_string()
    }
}

/// Read a 24-bit big-endian length and return the bytes it covers
fn read_u24_prefixed(data: &[u8]) -> Result<&[u8]> {
    if data.len() < 3 {
        anyhow::bail!("Missing length prefix");
    }

    let len = ((data[0] as usize) << 16) | ((data[1] as usize) << 8) | (data[2] as usize);
    let end = 3 + len;
    if data.len() < end {
        anyhow::bail!("Truncated: expected {} bytes, have {}", len, data.len() - 3);
    }

    Ok(&data[3..end])
}
