// src/policy.rs
//! Certificate policy identifiers and the table of known EV policies

use lazy_static::lazy_static;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// A certificate policy object identifier, stored as its dotted arcs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PolicyIdentifier(Vec<u64>);

impl PolicyIdentifier {
    /// Build an identifier from its arcs
    pub fn new(arcs: impl Into<Vec<u64>>) -> Self {
        Self(arcs.into())
    }

    pub fn arcs(&self) -> &[u64] {
        &self.0
    }
}

impl From<&[u64]> for PolicyIdentifier {
    fn from(arcs: &[u64]) -> Self {
        Self(arcs.to_vec())
    }
}

impl fmt::Display for PolicyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", arc)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for PolicyIdentifier {
    type Err = anyhow::Error;

    /// Parse dotted notation such as `2.16.840.1.114412.2.1`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let arcs = s
            .trim()
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    anyhow::bail!("Invalid OID arc '{}' in '{}'", part, s);
                }
                part.parse::<u64>()
                    .map_err(|e| anyhow::anyhow!("Invalid OID arc '{}' in '{}': {}", part, s, e))
            })
            .collect::<anyhow::Result<Vec<u64>>>()?;

        if arcs.len() < 2 {
            anyhow::bail!("OID '{}' must have at least two arcs", s);
        }

        Ok(Self(arcs))
    }
}

/// Policy identifiers that CAs assert on Extended Validation certificates.
///
/// Entries are listed as published; the repeated 1.3.6.1.4.1.34697.2.1 is
/// collapsed when [`EV_POLICY_SET`] is built.
pub static EV_POLICY_OIDS: &[&[u64]] = &[
    &[1, 3, 6, 1, 4, 1, 34697, 2, 1],
    &[1, 3, 6, 1, 4, 1, 34697, 2, 2],
    &[1, 3, 6, 1, 4, 1, 34697, 2, 1],
    &[1, 3, 6, 1, 4, 1, 34697, 2, 3],
    &[1, 3, 6, 1, 4, 1, 34697, 2, 4],
    &[1, 2, 40, 0, 17, 1, 22],
    &[2, 16, 578, 1, 26, 1, 3, 3],
    &[1, 3, 6, 1, 4, 1, 17326, 10, 14, 2, 1, 2],
    &[1, 3, 6, 1, 4, 1, 17326, 10, 8, 12, 1, 2],
    &[1, 3, 6, 1, 4, 1, 6449, 1, 2, 1, 5, 1],
    &[2, 16, 840, 1, 114412, 2, 1],
    &[2, 16, 528, 1, 1001, 1, 1, 1, 12, 6, 1, 1, 1],
    &[2, 16, 840, 1, 114028, 10, 1, 2],
    &[1, 3, 6, 1, 4, 1, 14370, 1, 6],
    &[1, 3, 6, 1, 4, 1, 4146, 1, 1],
    &[2, 16, 840, 1, 114413, 1, 7, 23, 3],
    &[1, 3, 6, 1, 4, 1, 14777, 6, 1, 1],
    &[1, 3, 6, 1, 4, 1, 14777, 6, 1, 2],
    &[1, 3, 6, 1, 4, 1, 22234, 2, 5, 2, 3, 1],
    &[1, 3, 6, 1, 4, 1, 782, 1, 2, 1, 8, 1],
    &[1, 3, 6, 1, 4, 1, 8024, 0, 2, 100, 1, 2],
    &[1, 2, 392, 200091, 100, 721, 1],
    &[2, 16, 840, 1, 114414, 1, 7, 23, 3],
    &[1, 3, 6, 1, 4, 1, 23223, 2],
    &[1, 3, 6, 1, 4, 1, 23223, 1, 1, 1],
    &[1, 3, 6, 1, 5, 5, 7, 1, 1],
    &[2, 16, 756, 1, 89, 1, 2, 1, 1],
    &[2, 16, 840, 1, 113733, 1, 7, 48, 1],
    &[2, 16, 840, 1, 114404, 1, 1, 2, 4, 1],
    &[2, 16, 840, 1, 113733, 1, 7, 23, 6],
    &[1, 3, 6, 1, 4, 1, 6334, 1, 100, 1],
];

lazy_static! {
    /// Read-only, deduplicated view of [`EV_POLICY_OIDS`]
    pub static ref EV_POLICY_SET: HashSet<PolicyIdentifier> = EV_POLICY_OIDS
        .iter()
        .map(|arcs| PolicyIdentifier::from(*arcs))
        .collect();
}

/// Check whether a policy identifier belongs to a known EV policy
pub fn is_ev_policy(oid: &PolicyIdentifier) -> bool {
    EV_POLICY_SET.contains(oid)
}
