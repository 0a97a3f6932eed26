//! Connection count reservations.
//!
//! # Responsibilities
//! - Reserve a slot in a host's connection count before connecting
//! - Release it exactly once, on drop
//! - Give each reservation an id for tracing

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::load_balancer::{HostKey, LoadBalancer};
use crate::net::HostAddr;

/// Only uniqueness is needed, relaxed ordering suffices.
static LEASE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeaseId(u64);

impl LeaseId {
    pub fn new() -> Self {
        Self(LEASE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for LeaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LeaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lease-{}", self.0)
    }
}

/// Guard holding one unit of a host's connection count.
/// Decrements the count when dropped, including when the owning
/// connect future is abandoned.
#[derive(Debug)]
pub struct ConnectionLease {
    balancer: Arc<LoadBalancer>,
    host: String,
    id: LeaseId,
}

impl ConnectionLease {
    /// Selects the least-loaded eligible host and reserves a slot on it.
    pub fn reserve(
        balancer: &Arc<LoadBalancer>,
        excluding: &HashSet<HostKey>,
    ) -> Option<(HostAddr, Self)> {
        let (host, addr) = balancer.select_and_reserve(excluding)?;
        Some((addr, Self::held(balancer, host)))
    }

    fn held(balancer: &Arc<LoadBalancer>, host: HostKey) -> Self {
        let id = LeaseId::new();
        tracing::trace!(lease_id = %id, host = %host, "Connection count reserved");
        Self {
            balancer: Arc::clone(balancer),
            host,
            id,
        }
    }

    pub fn id(&self) -> LeaseId {
        self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        self.balancer.adjust_connections(&self.host, -1);
        tracing::trace!(lease_id = %self.id, host = %self.host, "Connection count released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::BalancerSettings;
    use crate::net::memory::{MemoryCluster, MemoryNode};
    use crate::net::{Connector, HostAddr};

    #[test]
    fn lease_id_unique() {
        assert_ne!(LeaseId::new(), LeaseId::new());
    }

    #[tokio::test]
    async fn lease_counts() {
        let cluster = MemoryCluster::new(vec![MemoryNode::new("h1")]);
        let conn = cluster.connect(&HostAddr::new("h1", 5433)).await.unwrap();
        let lb = Arc::new(LoadBalancer::uniform(BalancerSettings::default()));
        lb.refresh(&conn).await;

        let none = HashSet::new();
        let (_, l1) = ConnectionLease::reserve(&lb, &none).unwrap();
        let (_, l2) = ConnectionLease::reserve(&lb, &none).unwrap();
        assert_eq!(lb.connection_count("h1"), Some(2));
        assert_eq!(l1.host(), "h1");

        drop(l1);
        assert_eq!(lb.connection_count("h1"), Some(1));
        drop(l2);
        assert_eq!(lb.connection_count("h1"), Some(0));
    }

    #[tokio::test]
    async fn reserve_spreads_and_releases() {
        let cluster = MemoryCluster::new(vec![MemoryNode::new("h1"), MemoryNode::new("h2")]);
        let conn = cluster.connect(&HostAddr::new("h1", 5433)).await.unwrap();
        let lb = Arc::new(LoadBalancer::uniform(BalancerSettings::default()));
        lb.refresh(&conn).await;

        let none = HashSet::new();
        let (a, la) = ConnectionLease::reserve(&lb, &none).unwrap();
        let (b, lb2) = ConnectionLease::reserve(&lb, &none).unwrap();
        assert_ne!(a, b);
        assert_eq!(la.host(), a.host);
        assert_eq!(lb.connection_count(&b.host), Some(1));

        let excluding: HashSet<HostKey> = ["h1".to_string(), "h2".to_string()].into();
        assert!(ConnectionLease::reserve(&lb, &excluding).is_none());

        drop(la);
        drop(lb2);
        assert_eq!(lb.connection_count("h1"), Some(0));
        assert_eq!(lb.connection_count("h2"), Some(0));
    }
}
