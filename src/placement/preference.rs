//! Placement preference parsing and ranking.
//!
//! Grammar: `entry (',' entry)*` where `entry := cloud.region.zone (':' rank)?`.
//! Entries without a rank land in tier 1. Ranks outside 1..=10, a trailing
//! colon, or more than one colon are configuration errors.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::BalancerError;
use crate::placement::descriptor::PlacementDescriptor;

/// Highest rank a tier may declare.
pub const MAX_PREFERENCE_VALUE: u8 = 10;

/// Bookkeeping rank of the implicit rest-of-cluster tier.
pub const REST_OF_CLUSTER_RANK: i32 = -1;

/// Priority of a member under a placement preference.
///
/// Every declared tier sorts before `RestOfCluster`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "i32")]
pub enum Priority {
    Tier(u8),
    RestOfCluster,
}

impl Priority {
    /// Numeric rank: `1..=10` for declared tiers, `-1` for rest of cluster.
    pub fn rank(&self) -> i32 {
        match self {
            Self::Tier(n) => i32::from(*n),
            Self::RestOfCluster => REST_OF_CLUSTER_RANK,
        }
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Tier(a), Self::Tier(b)) => a.cmp(b),
            (Self::Tier(_), Self::RestOfCluster) => Ordering::Less,
            (Self::RestOfCluster, Self::Tier(_)) => Ordering::Greater,
            (Self::RestOfCluster, Self::RestOfCluster) => Ordering::Equal,
        }
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<Priority> for i32 {
    fn from(p: Priority) -> Self {
        p.rank()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tier(n) => write!(f, "tier-{}", n),
            Self::RestOfCluster => f.write_str("rest-of-cluster"),
        }
    }
}

/// Ordered rank -> pattern set mapping. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementPreference {
    source: String,
    tiers: BTreeMap<u8, Vec<PlacementDescriptor>>,
}

impl PlacementPreference {
    pub fn parse(text: &str) -> Result<Self, BalancerError> {
        let mut tiers: BTreeMap<u8, Vec<PlacementDescriptor>> = BTreeMap::new();

        for entry in text.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                return Err(malformed(text));
            }

            let parts: Vec<&str> = entry.split(':').collect();
            let rank = match parts.as_slice() {
                [_] => 1,
                [_, rank] => parse_rank(rank.trim(), text)?,
                _ => return Err(malformed(text)),
            };

            let pattern: PlacementDescriptor = parts[0].parse()?;
            let set = tiers.entry(rank).or_default();
            if !set.contains(&pattern) {
                set.push(pattern);
            }
        }

        Ok(Self {
            source: text.to_string(),
            tiers,
        })
    }

    /// Lowest-numbered tier whose patterns match, else rest of cluster.
    pub fn priority_of(&self, placement: &PlacementDescriptor) -> Priority {
        self.tiers
            .iter()
            .find(|(_, patterns)| placement.is_contained_in(patterns.iter()))
            .map(|(rank, _)| Priority::Tier(*rank))
            .unwrap_or(Priority::RestOfCluster)
    }

    /// Patterns declared at `rank`; empty for undeclared ranks.
    pub fn tier(&self, rank: u8) -> &[PlacementDescriptor] {
        self.tiers.get(&rank).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tiers(&self) -> impl Iterator<Item = (u8, &[PlacementDescriptor])> {
        self.tiers.iter().map(|(r, p)| (*r, p.as_slice()))
    }

    /// Number of ranks that declare at least one pattern.
    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    /// Configuration text as given.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl FromStr for PlacementPreference {
    type Err = BalancerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_rank(raw: &str, text: &str) -> Result<u8, BalancerError> {
    let rank: i64 = raw.parse().map_err(|_| malformed(text))?;
    if rank < 1 || rank > i64::from(MAX_PREFERENCE_VALUE) {
        return Err(BalancerError::configuration(format!(
            "Invalid preference value '{}' in topology-keys '{}': expected 1..={}",
            raw, text, MAX_PREFERENCE_VALUE
        )));
    }
    Ok(rank as u8)
}

fn malformed(text: &str) -> BalancerError {
    BalancerError::configuration(format!("Malformed topology-keys property value: {}", text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_tiers() {
        let pref = PlacementPreference::parse("cloud1.dc1.rack1:1,cloud2.dc2.rack2:2").unwrap();

        assert_eq!(pref.tier_count(), 2);
        assert_eq!(pref.tier(1), &[PlacementDescriptor::new("cloud1", "dc1", "rack1")]);
        assert_eq!(pref.tier(2), &[PlacementDescriptor::new("cloud2", "dc2", "rack2")]);
        assert!(pref.tier(3).is_empty());
    }

    #[test]
    fn test_default_rank_and_union() {
        let pref =
            PlacementPreference::parse("aws.us-west.a, aws.us-west.b:1 ,aws.us-east.*:3").unwrap();

        assert_eq!(pref.tier(1).len(), 2);
        assert_eq!(pref.tier(3), &[PlacementDescriptor::new("aws", "us-east", "*")]);
        assert_eq!(pref.tier_count(), 2);
    }

    #[test]
    fn test_invalid_ranks() {
        for text in [
            "cloud.dc.rack:0",
            "cloud.dc.rack:11",
            "cloud.dc.rack:",
            "cloud.dc.rack:-1",
            "cloud.dc.rack:one",
            "cloud.dc.rack:1:2",
            "cloud.dc.rack:1,",
            "",
        ] {
            let err = PlacementPreference::parse(text).unwrap_err();
            assert!(err.is_configuration(), "{:?} should be rejected", text);
        }
    }

    #[test]
    fn test_priority_of() {
        let pref = PlacementPreference::parse("aws.us-west.us-west-2a:1,aws.us-west.*:2").unwrap();

        let a = PlacementDescriptor::new("aws", "us-west", "us-west-2a");
        let b = PlacementDescriptor::new("aws", "us-west", "us-west-2b");
        let c = PlacementDescriptor::new("gcp", "europe", "eu-1");

        assert_eq!(pref.priority_of(&a), Priority::Tier(1));
        assert_eq!(pref.priority_of(&b), Priority::Tier(2));
        assert_eq!(pref.priority_of(&c), Priority::RestOfCluster);
        assert_eq!(pref.priority_of(&c).rank(), -1);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Tier(1) < Priority::Tier(2));
        assert!(Priority::Tier(10) < Priority::RestOfCluster);
        assert_eq!(serde_json::to_string(&Priority::RestOfCluster).unwrap(), "-1");
        assert_eq!(serde_json::to_string(&Priority::Tier(3)).unwrap(), "3");
    }
}
