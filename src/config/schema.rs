//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every section has defaults so a file only needs the seed list.

use serde::{Deserialize, Serialize};

use crate::net::DEFAULT_PORT;

/// Root configuration for the balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct BalancerConfig {
    /// Seed hosts and member defaults.
    pub cluster: ClusterConfig,

    /// Load balancing and placement settings.
    pub load_balance: LoadBalanceConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Cluster seed configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    /// Seed addresses, `host[:port]`, tried in order.
    pub seeds: Vec<String>,

    /// Port for seeds and members that do not name one.
    pub default_port: u16,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            default_port: DEFAULT_PORT,
        }
    }
}

/// Load balancing configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoadBalanceConfig {
    /// When false every request connects through the seeds directly.
    pub enabled: bool,

    /// Placement preference, e.g. `"aws.us-west.us-west-2a:1,aws.us-west.*:2"`.
    pub topology_keys: Option<String>,

    /// Topology refresh interval. Values outside 0..=600 fall back to 300.
    pub refresh_interval_secs: i64,

    /// How long a failed host stays quarantined.
    pub failed_host_ttl_secs: u64,
}

impl Default for LoadBalanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            topology_keys: None,
            refresh_interval_secs: 300,
            failed_host_ttl_secs: 5,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Physical connect timeout, applied to data and control connections.
    pub connect_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { connect_secs: 5 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level when RUST_LOG is unset.
    pub log_level: String,

    /// Install a Prometheus recorder.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
        }
    }
}
