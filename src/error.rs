//! Error taxonomy for connection routing.
//!
//! # Propagation
//! - `Configuration`: fatal, raised while building a balancer, never retried
//! - `NodeUnreachable`: one candidate failed; absorbed by quarantine + retry
//! - `TopologyQuery`: metadata query failed; absorbed by single-host degradation
//! - `ClusterUnavailable`: surfaced to the caller once seeds or candidates are exhausted

use thiserror::Error;

/// Errors produced while selecting and connecting to cluster members.
#[derive(Debug, Error)]
pub enum BalancerError {
    /// Malformed placement preference or connection settings.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A single host refused or timed out.
    #[error("Node unreachable: {host}: {reason}")]
    NodeUnreachable { host: String, reason: String },

    /// No seed accepted a control connection, or no candidate host is left.
    #[error("Cluster unavailable: {0}")]
    ClusterUnavailable(String),

    /// The cluster metadata query failed.
    #[error("Topology query failed: {0}")]
    TopologyQuery(String),

    /// Transport-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BalancerError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn node_unreachable(host: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NodeUnreachable {
            host: host.into(),
            reason: reason.into(),
        }
    }

    pub fn cluster_unavailable(msg: impl Into<String>) -> Self {
        Self::ClusterUnavailable(msg.into())
    }

    pub fn topology_query(msg: impl Into<String>) -> Self {
        Self::TopologyQuery(msg.into())
    }

    /// Whether the orchestrator recovers from this error on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NodeUnreachable { .. } | Self::TopologyQuery(_) | Self::Io(_)
        )
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Result type for balancer operations.
pub type BalancerResult<T> = Result<T, BalancerError>;
