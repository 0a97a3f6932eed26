//! Connection factory: control connection, refresh, select, connect, preempt.
//!
//! # Request State Machine
//! ```text
//! round 1..=rank_count:
//!     refresh (control connection; bootstrap through seeds + known members)
//!         query failed → single-host path over the seeds
//!     loop:
//!         select least-loaded host of best tier (minus hosts failed this request)
//!             none → ClusterUnavailable("no reachable host in cluster")
//!         lease count → connect (timeout)
//!             failed → release, quarantine, force refresh, next candidate
//!         post-connect refresh
//!             query failed → keep the connection
//!             host no longer selectable → close, release, quarantine, next candidate
//!     better tier available and rounds left → close, release, next round
//!     return connection (lease held until close)
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::BalancerConfig;
use crate::error::{BalancerError, BalancerResult};
use crate::load_balancer::{BalancerRegistry, HostKey, LoadBalancer};
use crate::net::{ClusterConnection, ConnectionLease, Connector, HostAddr};
use crate::observability::metrics;
use crate::orchestrator::balanced::BalancedConnection;

/// Opens balanced connections for one configuration.
pub struct ConnectionFactory<C: Connector> {
    connector: Arc<C>,
    seeds: Vec<HostAddr>,
    connect_timeout: Duration,
    balancer: Option<Arc<LoadBalancer>>,
    control: tokio::sync::Mutex<Option<C::Connection>>,
}

impl<C: Connector> ConnectionFactory<C> {
    /// Builds a factory, sharing a balancer with factories of the same
    /// seeds and placement text. Malformed placement text fails here.
    pub fn new(
        connector: Arc<C>,
        config: &BalancerConfig,
        registry: &BalancerRegistry,
    ) -> BalancerResult<Self> {
        let seeds = config
            .cluster
            .seeds
            .iter()
            .map(|s| HostAddr::parse(s, config.cluster.default_port))
            .collect::<BalancerResult<Vec<_>>>()?;
        if seeds.is_empty() {
            return Err(BalancerError::configuration("at least one seed host is required"));
        }

        let balancer = if config.load_balance.enabled {
            Some(registry.get_or_create(
                &seeds,
                &config.load_balance,
                config.cluster.default_port,
            )?)
        } else {
            None
        };

        Ok(Self {
            connector,
            seeds,
            connect_timeout: Duration::from_secs(config.timeouts.connect_secs),
            balancer,
            control: tokio::sync::Mutex::new(None),
        })
    }

    pub fn balancer(&self) -> Option<&Arc<LoadBalancer>> {
        self.balancer.as_ref()
    }

    pub fn seeds(&self) -> &[HostAddr] {
        &self.seeds
    }

    /// Opens a connection to the best reachable host.
    ///
    /// Dropping the returned future releases any count it reserved and
    /// drops any connection it opened.
    pub async fn connect(&self) -> BalancerResult<BalancedConnection<C::Connection>> {
        let Some(balancer) = &self.balancer else {
            return self.connect_single_host().await;
        };

        let rounds = balancer.rank_count();
        let mut round = 1;
        loop {
            if !self.refresh_topology(balancer).await? {
                warn!("Topology unavailable, connecting without load balancing");
                return self.connect_single_host().await;
            }

            let (host, conn) = self.connect_least_loaded(balancer).await?;

            if round < rounds && balancer.has_more_preferred_node(&host) {
                info!(host = %host, round, "More preferred host available, preempting");
                metrics::record_preemption();
                if let Err(e) = conn.close().await {
                    debug!(host = %host, error = %e, "Close of preempted connection failed");
                }
                round += 1;
                continue;
            }

            debug!(host = %host, round, "Connection established");
            return Ok(conn);
        }
    }

    /// Closes the cached control connection, if any.
    pub async fn shutdown(&self) {
        if let Some(conn) = self.control.lock().await.take() {
            if let Err(e) = conn.close().await {
                debug!(host = %conn.host(), error = %e, "Close of control connection failed");
            }
        }
    }

    /// Runs a refresh if due. `Ok(false)` means the topology query failed.
    async fn refresh_topology(&self, balancer: &LoadBalancer) -> BalancerResult<bool> {
        if !balancer.needs_refresh() {
            return Ok(true);
        }

        let mut control = match self.control.try_lock() {
            Ok(guard) => guard,
            Err(_) if balancer.has_snapshot() => return Ok(true),
            Err(_) => self.control.lock().await,
        };

        if let Some(conn) = control.as_ref() {
            if balancer.refresh(conn).await {
                return Ok(true);
            }
        }
        if let Some(stale) = control.take() {
            debug!(host = %stale.host(), "Replacing control connection");
            if let Err(e) = stale.close().await {
                debug!(host = %stale.host(), error = %e, "Close of stale control connection failed");
            }
        }

        let conn = self.bootstrap_control(balancer).await?;
        let refreshed = balancer.refresh(&conn).await;
        *control = Some(conn);
        Ok(refreshed)
    }

    /// First of seeds, then known members, that accepts a connection.
    async fn bootstrap_control(&self, balancer: &LoadBalancer) -> BalancerResult<C::Connection> {
        let candidates = balancer.bootstrap_candidates(&self.seeds);
        for addr in &candidates {
            match self.open(addr).await {
                Ok(conn) => {
                    info!(host = %addr, "Control connection established");
                    return Ok(conn);
                }
                Err(e) => warn!(host = %addr, error = %e, "Control connection attempt failed"),
            }
        }
        Err(BalancerError::cluster_unavailable(format!(
            "could not connect to any of {} seed or known hosts",
            candidates.len()
        )))
    }

    async fn connect_least_loaded(
        &self,
        balancer: &Arc<LoadBalancer>,
    ) -> BalancerResult<(HostKey, BalancedConnection<C::Connection>)> {
        let mut failed: HashSet<HostKey> = HashSet::new();

        loop {
            let Some((addr, lease)) = ConnectionLease::reserve(balancer, &failed) else {
                return Err(BalancerError::cluster_unavailable("no reachable host in cluster"));
            };
            let host = lease.host().to_string();

            let conn = match self.open(&addr).await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(host = %addr, error = %e, "Connect failed, trying next host");
                    metrics::record_connect_attempt("failed");
                    drop(lease);
                    balancer.mark_failed(&host);
                    balancer.force_refresh();
                    failed.insert(host);
                    continue;
                }
            };

            if !balancer.refresh(&conn).await {
                warn!(host = %addr, "Topology unavailable after connect, keeping connection");
            } else if !balancer.is_selectable(&host) {
                warn!(host = %addr, "Host no longer eligible after connect");
                metrics::record_connect_attempt("rejected");
                if let Err(e) = conn.close().await {
                    debug!(host = %addr, error = %e, "Close of rejected connection failed");
                }
                drop(lease);
                balancer.mark_failed(&host);
                balancer.force_refresh();
                failed.insert(host);
                continue;
            }

            metrics::record_connect_attempt("ok");
            return Ok((host, BalancedConnection::load_balanced(conn, addr, lease)));
        }
    }

    /// Non-balanced path: seeds in order, first success wins.
    async fn connect_single_host(&self) -> BalancerResult<BalancedConnection<C::Connection>> {
        metrics::record_single_host_fallback();
        let mut last_err = None;
        for addr in &self.seeds {
            match self.open(addr).await {
                Ok(conn) => return Ok(BalancedConnection::single_host(conn, addr.clone())),
                Err(e) => {
                    warn!(host = %addr, error = %e, "Seed connect failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| BalancerError::cluster_unavailable("no seed hosts")))
    }

    async fn open(&self, addr: &HostAddr) -> BalancerResult<C::Connection> {
        match tokio::time::timeout(self.connect_timeout, self.connector.connect(addr)).await {
            Ok(result) => result,
            Err(_) => Err(BalancerError::node_unreachable(
                addr.to_string(),
                format!("connect timed out after {:?}", self.connect_timeout),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::memory::{MemoryCluster, MemoryNode};
    use crate::orchestrator::ConnectMode;

    fn config(seeds: &[&str]) -> BalancerConfig {
        let mut config = BalancerConfig::default();
        config.cluster.seeds = seeds.iter().map(|s| s.to_string()).collect();
        config
    }

    fn three_nodes() -> Arc<MemoryCluster> {
        Arc::new(MemoryCluster::new(vec![
            MemoryNode::new("h1"),
            MemoryNode::new("h2"),
            MemoryNode::new("h3"),
        ]))
    }

    #[tokio::test]
    async fn test_connect_balances_and_releases() {
        let cluster = three_nodes();
        let registry = BalancerRegistry::new();
        let factory = ConnectionFactory::new(cluster.clone(), &config(&["h1"]), &registry).unwrap();

        let mut conns = Vec::new();
        for _ in 0..6 {
            conns.push(factory.connect().await.unwrap());
        }
        let lb = factory.balancer().unwrap();
        for host in ["h1", "h2", "h3"] {
            assert_eq!(lb.connection_count(host), Some(2));
        }
        assert!(conns.iter().all(|c| c.mode() == ConnectMode::LoadBalanced));

        for conn in conns {
            conn.close().await.unwrap();
        }
        for host in ["h1", "h2", "h3"] {
            assert_eq!(lb.connection_count(host), Some(0));
        }
    }

    #[tokio::test]
    async fn test_disabled_uses_seeds_in_order() {
        let cluster = three_nodes();
        cluster.stop_node("h1");
        let mut cfg = config(&["h1", "h2"]);
        cfg.load_balance.enabled = false;

        let factory =
            ConnectionFactory::new(cluster.clone(), &cfg, &BalancerRegistry::new()).unwrap();
        let conn = factory.connect().await.unwrap();

        assert_eq!(conn.mode(), ConnectMode::SingleHost);
        assert_eq!(conn.addr().host, "h2");
        assert!(conn.lease_id().is_none());
        assert_eq!(cluster.query_count(), 0);
    }

    #[tokio::test]
    async fn test_bad_placement_fails_at_construction() {
        let mut cfg = config(&["h1"]);
        cfg.load_balance.topology_keys = Some("aws.us-west.a:".to_string());

        let result = ConnectionFactory::new(three_nodes(), &cfg, &BalancerRegistry::new());
        assert!(matches!(result, Err(BalancerError::Configuration(_))));
    }
}
