//! Balancer registry keyed by configuration signature.
//!
//! Factories built from the same seed set and placement text share one
//! [`LoadBalancer`]; any difference gets an independent instance.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::config::schema::LoadBalanceConfig;
use crate::error::BalancerResult;
use crate::load_balancer::strategy::{BalancerSettings, LoadBalancer};
use crate::net::HostAddr;
use crate::placement::PlacementPreference;

/// Identity of a balancer: sorted seeds plus placement text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigSignature {
    pub seeds: BTreeSet<String>,
    pub placement: Option<String>,
}

impl ConfigSignature {
    pub fn new(seeds: &[HostAddr], placement: Option<&str>) -> Self {
        Self {
            seeds: seeds.iter().map(ToString::to_string).collect(),
            placement: placement.map(str::to_string),
        }
    }
}

#[derive(Debug, Default)]
pub struct BalancerRegistry {
    balancers: DashMap<ConfigSignature, Arc<LoadBalancer>>,
}

impl BalancerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the balancer for this configuration, creating it on first use.
    ///
    /// Placement text is parsed before lookup, so a malformed value fails
    /// even when a balancer would never be created. Settings of later
    /// callers with the same signature are ignored.
    pub fn get_or_create(
        &self,
        seeds: &[HostAddr],
        config: &LoadBalanceConfig,
        default_port: u16,
    ) -> BalancerResult<Arc<LoadBalancer>> {
        let placement = config.topology_keys.as_deref();
        let preference = placement.map(PlacementPreference::parse).transpose()?;
        let signature = ConfigSignature::new(seeds, placement);

        let balancer = self
            .balancers
            .entry(signature)
            .or_insert_with(|| {
                debug!(
                    placement = ?preference.as_ref().map(PlacementPreference::source),
                    tiers = preference.as_ref().map_or(0, PlacementPreference::tier_count),
                    seeds = seeds.len(),
                    "Creating load balancer"
                );
                Arc::new(LoadBalancer::new(
                    preference,
                    BalancerSettings::from_config(config, default_port),
                ))
            })
            .clone();
        Ok(balancer)
    }

    pub fn get(&self, signature: &ConfigSignature) -> Option<Arc<LoadBalancer>> {
        self.balancers.get(signature).map(|b| Arc::clone(b.value()))
    }

    pub fn len(&self) -> usize {
        self.balancers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balancers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeds(hosts: &[&str]) -> Vec<HostAddr> {
        hosts.iter().map(|h| HostAddr::new(*h, 5433)).collect()
    }

    #[test]
    fn test_same_signature_shares_balancer() {
        let registry = BalancerRegistry::new();
        let config = LoadBalanceConfig {
            topology_keys: Some("aws.us-west.*:1".to_string()),
            ..LoadBalanceConfig::default()
        };

        let a = registry.get_or_create(&seeds(&["h1", "h2"]), &config, 5433).unwrap();
        let b = registry.get_or_create(&seeds(&["h2", "h1"]), &config, 5433).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_different_placement_is_independent() {
        let registry = BalancerRegistry::new();
        let uniform = LoadBalanceConfig::default();
        let placed = LoadBalanceConfig {
            topology_keys: Some("aws.us-west.*:1".to_string()),
            ..LoadBalanceConfig::default()
        };

        let a = registry.get_or_create(&seeds(&["h1"]), &uniform, 5433).unwrap();
        let b = registry.get_or_create(&seeds(&["h1"]), &placed, 5433).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(a.preference().is_none());
        assert_eq!(b.rank_count(), 2);
        assert_eq!(b.preference().map(PlacementPreference::source), Some("aws.us-west.*:1"));

        let sig = ConfigSignature::new(&seeds(&["h1"]), Some("aws.us-west.*:1"));
        assert!(registry.get(&sig).is_some());
    }

    #[test]
    fn test_malformed_placement_fails_fast() {
        let registry = BalancerRegistry::new();
        let config = LoadBalanceConfig {
            topology_keys: Some("aws.us-west.*:11".to_string()),
            ..LoadBalanceConfig::default()
        };

        let err = registry.get_or_create(&seeds(&["h1"]), &config, 5433).unwrap_err();
        assert!(err.is_configuration());
        assert!(registry.is_empty());
    }
}
