//! Concurrent connection requests against one shared balancer.

use std::sync::Arc;
use std::time::Duration;

use cluster_balancer::load_balancer::BalancerRegistry;
use cluster_balancer::net::memory::{MemoryCluster, MemoryNode};
use cluster_balancer::ConnectionFactory;

mod common;

fn cluster(n: usize) -> Arc<MemoryCluster> {
    Arc::new(MemoryCluster::new(
        (1..=n).map(|i| MemoryNode::new(format!("h{}", i))).collect(),
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_connects_share_counts() {
    let cluster = cluster(4);
    let factory = Arc::new(common::factory(&cluster, &common::config(&["h1"], None)));

    let mut handles = Vec::new();
    for _ in 0..64 {
        let factory = Arc::clone(&factory);
        handles.push(tokio::spawn(async move { factory.connect().await }));
    }

    let mut conns = Vec::new();
    for handle in handles {
        conns.push(handle.await.unwrap().unwrap());
    }

    let lb = factory.balancer().unwrap();
    let counts: Vec<u64> = (1..=4)
        .map(|i| lb.connection_count(&format!("h{}", i)).unwrap())
        .collect();
    assert_eq!(counts.iter().sum::<u64>(), 64);
    assert!(counts.iter().all(|c| *c > 0), "{:?}", counts);
    assert_eq!(cluster.query_count(), 1);

    drop(conns);
    for i in 1..=4 {
        assert_eq!(lb.connection_count(&format!("h{}", i)), Some(0));
    }
    // Only the control connection stays open
    assert_eq!(cluster.total_open_connections(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_connect_releases_reservation() {
    let cluster = cluster(2);
    let factory = common::factory(&cluster, &common::config(&["h1"], None));
    factory.connect().await.unwrap().close().await.unwrap();

    cluster.set_connect_delay("h1", Duration::from_secs(3));
    cluster.set_connect_delay("h2", Duration::from_secs(3));

    let result = tokio::time::timeout(Duration::from_secs(1), factory.connect()).await;
    assert!(result.is_err());

    let lb = factory.balancer().unwrap();
    assert_eq!(lb.connection_count("h1"), Some(0));
    assert_eq!(lb.connection_count("h2"), Some(0));
    assert_eq!(cluster.total_open_connections(), 1);
}

#[tokio::test]
async fn test_registry_isolates_configurations() {
    let cluster = cluster(3);
    let registry = BalancerRegistry::new();

    let uniform = ConnectionFactory::new(
        Arc::clone(&cluster),
        &common::config(&["h1"], None),
        &registry,
    )
    .unwrap();
    let shared = ConnectionFactory::new(
        Arc::clone(&cluster),
        &common::config(&["h1"], None),
        &registry,
    )
    .unwrap();
    let placed = ConnectionFactory::new(
        Arc::clone(&cluster),
        &common::config(&["h1"], Some("cloud1.datacenter1.rack1:1")),
        &registry,
    )
    .unwrap();
    assert_eq!(registry.len(), 2);

    let _a = uniform.connect().await.unwrap();
    let _b = shared.connect().await.unwrap();
    let _c = placed.connect().await.unwrap();

    let uniform_total: u64 = (1..=3)
        .filter_map(|i| uniform.balancer().unwrap().connection_count(&format!("h{}", i)))
        .sum();
    let placed_total: u64 = (1..=3)
        .filter_map(|i| placed.balancer().unwrap().connection_count(&format!("h{}", i)))
        .sum();
    assert_eq!(uniform_total, 2);
    assert_eq!(placed_total, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_failures_quarantine_once() {
    let cluster = cluster(3);
    cluster.stop_node("h3");
    let factory = Arc::new(common::factory(&cluster, &common::config(&["h1"], None)));

    let results = futures_util::future::join_all((0..32).map(|_| {
        let factory = Arc::clone(&factory);
        async move { factory.connect().await }
    }))
    .await;

    let conns: Vec<_> = results.into_iter().map(Result::unwrap).collect();
    assert!(conns.iter().all(|c| c.addr().host != "h3"));
    assert_eq!(
        factory.balancer().unwrap().snapshot().quarantined,
        vec!["h3".to_string()]
    );
}
