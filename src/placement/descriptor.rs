//! Placement descriptors and wildcard matching.
//!
//! # Responsibilities
//! - Represent a member's (cloud, region, zone) location
//! - Parse `cloud.region.zone` patterns
//! - Match a descriptor against a pattern set
//!
//! # Design Decisions
//! - Matching is case-insensitive on every component
//! - `*` is only legal in the zone position, on either side of the match
//! - Linear scan over patterns; tiers hold a handful of entries

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BalancerError;

/// Zone wildcard: any zone in the cloud.region.
pub const WILDCARD_ZONE: &str = "*";

/// Location of a cluster member, or a pattern over locations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlacementDescriptor {
    pub cloud: String,
    pub region: String,
    pub zone: String,
}

impl PlacementDescriptor {
    pub fn new(
        cloud: impl Into<String>,
        region: impl Into<String>,
        zone: impl Into<String>,
    ) -> Self {
        Self {
            cloud: cloud.into(),
            region: region.into(),
            zone: zone.into(),
        }
    }

    pub fn is_wildcard_zone(&self) -> bool {
        self.zone == WILDCARD_ZONE
    }

    /// Returns true if this descriptor falls under `pattern`.
    pub fn matches(&self, pattern: &PlacementDescriptor) -> bool {
        if !self.cloud.eq_ignore_ascii_case(&pattern.cloud)
            || !self.region.eq_ignore_ascii_case(&pattern.region)
        {
            return false;
        }
        pattern.is_wildcard_zone()
            || self.is_wildcard_zone()
            || self.zone.eq_ignore_ascii_case(&pattern.zone)
    }

    /// Returns true if any pattern in the set matches.
    pub fn is_contained_in<'a, I>(&self, patterns: I) -> bool
    where
        I: IntoIterator<Item = &'a PlacementDescriptor>,
    {
        patterns.into_iter().any(|p| self.matches(p))
    }
}

impl FromStr for PlacementDescriptor {
    type Err = BalancerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(BalancerError::configuration(format!(
                "Malformed topology-keys property value: {}",
                s
            )));
        }
        if parts.iter().any(|p| p.is_empty())
            || parts[0] == WILDCARD_ZONE
            || parts[1] == WILDCARD_ZONE
        {
            return Err(BalancerError::configuration(format!(
                "Malformed topology-keys property value: {}",
                s
            )));
        }
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl fmt::Display for PlacementDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.cloud, self.region, self.zone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(s: &str) -> PlacementDescriptor {
        s.parse().unwrap()
    }

    #[test]
    fn test_wildcard_zone_matching() {
        let node = PlacementDescriptor::new("aws", "us-west", "us-west-2a");

        assert!(node.matches(&pattern("aws.us-west.*")));
        assert!(node.matches(&pattern("aws.us-west.us-west-2a")));
        assert!(!node.matches(&pattern("aws.us-east.*")));
        assert!(!node.matches(&pattern("aws.us-west.us-west-2b")));
    }

    #[test]
    fn test_case_insensitive() {
        let node = PlacementDescriptor::new("AWS", "US-West", "US-WEST-2A");
        assert!(node.matches(&pattern("aws.us-west.us-west-2a")));
    }

    #[test]
    fn test_descriptor_side_wildcard() {
        let node = PlacementDescriptor::new("aws", "us-west", "*");
        assert!(node.matches(&pattern("aws.us-west.us-west-2c")));
        assert!(!node.matches(&pattern("gcp.us-west.us-west-2c")));
    }

    #[test]
    fn test_contained_in() {
        let set = vec![pattern("cloud1.dc1.rack1"), pattern("cloud2.dc2.*")];
        assert!(PlacementDescriptor::new("cloud2", "dc2", "rack9").is_contained_in(&set));
        assert!(!PlacementDescriptor::new("cloud3", "dc1", "rack1").is_contained_in(&set));
        assert!(!PlacementDescriptor::new("cloud1", "dc1", "rack1").is_contained_in(&[]));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("aws.us-west".parse::<PlacementDescriptor>().is_err());
        assert!("aws.us-west.a.b".parse::<PlacementDescriptor>().is_err());
        assert!("*.us-west.a".parse::<PlacementDescriptor>().is_err());
        assert!("aws.*.a".parse::<PlacementDescriptor>().is_err());
        assert!("aws..a".parse::<PlacementDescriptor>().is_err());

        let p = pattern("aws.us-west.*");
        assert!(p.is_wildcard_zone());
        assert_eq!(p.to_string(), "aws.us-west.*");
    }
}
