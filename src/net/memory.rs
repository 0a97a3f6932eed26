//! In-process cluster implementing the transport seams.
//!
//! # Responsibilities
//! - Serve the servers query from a mutable node list
//! - Accept or refuse connects per node state
//! - Count open connections per addressed member (`host`, or `host:port` off the default port)
//! - Inject faults: stopped nodes, unlisted nodes, failing queries, slow connects
//!
//! Used by the integration tests and the `simulate` command.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;

use crate::error::{BalancerError, BalancerResult};
use crate::net::transport::{ClusterConnection, Connector, HostAddr, DEFAULT_PORT};
use crate::topology::ServerRow;

fn default_true() -> bool {
    true
}

/// One simulated cluster member.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryNode {
    pub host: String,
    #[serde(default)]
    pub public_ip: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub cloud: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub zone: String,
    /// Accepts connections.
    #[serde(default = "default_true")]
    pub up: bool,
    /// Reported by the servers query.
    #[serde(default = "default_true")]
    pub listed: bool,
}

impl MemoryNode {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            public_ip: None,
            port: None,
            cloud: "cloud1".to_string(),
            region: "datacenter1".to_string(),
            zone: "rack1".to_string(),
            up: true,
            listed: true,
        }
    }

    pub fn public_ip(mut self, ip: impl Into<String>) -> Self {
        self.public_ip = Some(ip.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn placement(
        mut self,
        cloud: impl Into<String>,
        region: impl Into<String>,
        zone: impl Into<String>,
    ) -> Self {
        self.cloud = cloud.into();
        self.region = region.into();
        self.zone = zone.into();
        self
    }

    pub fn down(mut self) -> Self {
        self.up = false;
        self
    }

    fn has_address(&self, host: &str) -> bool {
        self.host == host || self.public_ip.as_deref() == Some(host)
    }

    fn listens_on(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Node reachable at `addr`.
    fn serves(&self, addr: &HostAddr) -> bool {
        self.has_address(&addr.host) && self.listens_on() == addr.port
    }

    /// `target` is a bare address (any port) or `host:port`.
    fn answers_to(&self, target: &str) -> bool {
        match HostAddr::parse(target, self.listens_on()) {
            Ok(addr) if target.contains(':') => self.serves(&addr),
            _ => self.has_address(target),
        }
    }

    fn to_row(&self) -> ServerRow {
        let mut row = ServerRow::new()
            .with("host", self.host.clone())
            .with("public_ip", self.public_ip.clone().unwrap_or_default())
            .with("cloud", self.cloud.clone())
            .with("region", self.region.clone())
            .with("zone", self.zone.clone());
        if let Some(port) = self.port {
            row.set("port", port.to_string());
        }
        row
    }
}

#[derive(Debug, Default)]
struct ClusterInner {
    nodes: Vec<MemoryNode>,
    open: HashMap<String, usize>,
    connect_attempts: HashMap<String, u64>,
    connect_delay: HashMap<String, Duration>,
    query_failure: bool,
    query_count: u64,
}

impl ClusterInner {
    fn node(&self, addr: &HostAddr) -> Option<&MemoryNode> {
        self.nodes.iter().find(|n| n.serves(addr))
    }

    fn update(&mut self, target: &str, f: impl Fn(&mut MemoryNode)) {
        self.nodes
            .iter_mut()
            .filter(|n| n.answers_to(target))
            .for_each(f);
    }

    fn release(&mut self, host: &str) {
        if let Some(count) = self.open.get_mut(host) {
            *count = count.saturating_sub(1);
        }
    }
}

/// Shared handle to a simulated cluster.
#[derive(Debug, Clone, Default)]
pub struct MemoryCluster {
    inner: Arc<Mutex<ClusterInner>>,
}

impl MemoryCluster {
    pub fn new(nodes: Vec<MemoryNode>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ClusterInner {
                nodes,
                ..Default::default()
            })),
        }
    }

    pub fn add_node(&self, node: MemoryNode) {
        self.inner.lock().nodes.push(node);
    }

    /// Node refuses new connects; existing ones stay open.
    /// A bare host matches every node on it, `host:port` just one.
    pub fn stop_node(&self, target: &str) {
        self.inner.lock().update(target, |n| n.up = false);
    }

    pub fn start_node(&self, target: &str) {
        self.inner.lock().update(target, |n| n.up = true);
    }

    /// Drops the node from the servers query without stopping it.
    pub fn unlist_node(&self, target: &str) {
        self.inner.lock().update(target, |n| n.listed = false);
    }

    pub fn list_node(&self, target: &str) {
        self.inner.lock().update(target, |n| n.listed = true);
    }

    pub fn set_query_failure(&self, fail: bool) {
        self.inner.lock().query_failure = fail;
    }

    /// Delays every connect addressed to `member` (`host`, or `host:port`
    /// off the default port).
    pub fn set_connect_delay(&self, member: &str, delay: Duration) {
        self.inner.lock().connect_delay.insert(member.to_string(), delay);
    }

    pub fn open_connections(&self, host: &str) -> usize {
        self.inner.lock().open.get(host).copied().unwrap_or(0)
    }

    pub fn total_open_connections(&self) -> usize {
        self.inner.lock().open.values().sum()
    }

    pub fn connect_attempts(&self, host: &str) -> u64 {
        self.inner.lock().connect_attempts.get(host).copied().unwrap_or(0)
    }

    pub fn query_count(&self) -> u64 {
        self.inner.lock().query_count
    }
}

#[async_trait]
impl Connector for MemoryCluster {
    type Connection = MemoryConnection;

    async fn connect(&self, addr: &HostAddr) -> BalancerResult<MemoryConnection> {
        let member = addr.key(DEFAULT_PORT);
        let delay = {
            let mut inner = self.inner.lock();
            *inner.connect_attempts.entry(member.clone()).or_insert(0) += 1;
            inner.connect_delay.get(&member).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock();
        match inner.node(addr) {
            Some(node) if node.up => {}
            Some(_) => {
                return Err(BalancerError::node_unreachable(
                    addr.to_string(),
                    "connection refused",
                ))
            }
            None => {
                return Err(BalancerError::node_unreachable(
                    addr.to_string(),
                    "unknown host",
                ))
            }
        }
        *inner.open.entry(member.clone()).or_insert(0) += 1;

        Ok(MemoryConnection {
            cluster: Arc::clone(&self.inner),
            addr: addr.clone(),
            member,
            closed: AtomicBool::new(false),
        })
    }
}

/// A connection to a [`MemoryCluster`] node. Released on close or drop.
#[derive(Debug)]
pub struct MemoryConnection {
    cluster: Arc<Mutex<ClusterInner>>,
    addr: HostAddr,
    member: String,
    closed: AtomicBool,
}

impl MemoryConnection {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn release(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.cluster.lock().release(&self.member);
        }
    }
}

#[async_trait]
impl ClusterConnection for MemoryConnection {
    fn host(&self) -> &str {
        &self.addr.host
    }

    async fn query_servers(&self) -> BalancerResult<Vec<ServerRow>> {
        let mut inner = self.cluster.lock();
        inner.query_count += 1;

        if self.is_closed() {
            return Err(BalancerError::topology_query("connection is closed"));
        }
        match inner.node(&self.addr) {
            Some(node) if node.up => {}
            _ => {
                return Err(BalancerError::node_unreachable(
                    self.addr.to_string(),
                    "connection reset",
                ))
            }
        }
        if inner.query_failure {
            return Err(BalancerError::topology_query("yb_servers() failed"));
        }

        Ok(inner
            .nodes
            .iter()
            .filter(|n| n.listed)
            .map(MemoryNode::to_row)
            .collect())
    }

    async fn close(&self) -> BalancerResult<()> {
        self.release();
        Ok(())
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.release();
    }
}
