//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use cluster_balancer::config::BalancerConfig;
use cluster_balancer::load_balancer::BalancerRegistry;
use cluster_balancer::net::memory::{MemoryCluster, MemoryNode};
use cluster_balancer::{BalancedConnection, ConnectionFactory};

pub type MemoryConn = BalancedConnection<<MemoryCluster as cluster_balancer::net::Connector>::Connection>;

/// Node in `aws.us-west.<zone>`.
pub fn node(host: &str, zone: &str) -> MemoryNode {
    MemoryNode::new(host).placement("aws", "us-west", zone)
}

/// Config with the given seeds and optional placement text.
pub fn config(seeds: &[&str], topology_keys: Option<&str>) -> BalancerConfig {
    let mut config = BalancerConfig::default();
    config.cluster.seeds = seeds.iter().map(|s| s.to_string()).collect();
    config.load_balance.topology_keys = topology_keys.map(str::to_string);
    config
}

pub fn factory(cluster: &Arc<MemoryCluster>, config: &BalancerConfig) -> ConnectionFactory<MemoryCluster> {
    ConnectionFactory::new(Arc::clone(cluster), config, &BalancerRegistry::new()).unwrap()
}

/// Open `n` connections sequentially.
pub async fn open_many(factory: &ConnectionFactory<MemoryCluster>, n: usize) -> Vec<MemoryConn> {
    let mut conns = Vec::with_capacity(n);
    for _ in 0..n {
        conns.push(factory.connect().await.unwrap());
    }
    conns
}

/// Connections per host.
pub fn per_host(conns: &[MemoryConn]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for conn in conns {
        *counts.entry(conn.addr().host.clone()).or_insert(0) += 1;
    }
    counts
}
