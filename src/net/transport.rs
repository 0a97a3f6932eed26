//! Seams to the wire-protocol client.
//!
//! The balancer never speaks the protocol itself. It opens connections through a
//! [`Connector`] and runs the servers query through a [`ClusterConnection`].

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{BalancerError, BalancerResult};
use crate::topology::ServerRow;

/// Default SQL port of a cluster member.
pub const DEFAULT_PORT: u16 = 5433;

/// Network endpoint of a cluster member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostAddr {
    pub host: String,
    pub port: u16,
}

impl HostAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parses `host`, `host:port` or `[v6]:port`.
    pub fn parse(text: &str, default_port: u16) -> BalancerResult<Self> {
        let text = text.trim();
        let invalid = || BalancerError::configuration(format!("Invalid host address: '{}'", text));

        if text.is_empty() {
            return Err(invalid());
        }

        if let Some(rest) = text.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
            let port = match tail.strip_prefix(':') {
                Some(p) => p.parse().map_err(|_| invalid())?,
                None if tail.is_empty() => default_port,
                None => return Err(invalid()),
            };
            if host.is_empty() {
                return Err(invalid());
            }
            return Ok(Self::new(host, port));
        }

        match text.split_once(':') {
            Some((host, port)) if !host.is_empty() && !port.contains(':') => {
                let port = port.parse().map_err(|_| invalid())?;
                Ok(Self::new(host, port))
            }
            Some(_) => Err(invalid()),
            None => Ok(Self::new(text, default_port)),
        }
    }

    /// Bookkeeping key: the bare host on `default_port`, else `host:port`.
    /// Members sharing a host on different ports get distinct keys.
    pub fn key(&self, default_port: u16) -> String {
        if self.port == default_port {
            self.host.clone()
        } else {
            self.to_string()
        }
    }
}

impl fmt::Display for HostAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// An open session to one cluster member.
#[async_trait]
pub trait ClusterConnection: Send + Sync + 'static {
    /// Host this connection was opened against.
    fn host(&self) -> &str;

    /// Runs the servers metadata query.
    async fn query_servers(&self) -> BalancerResult<Vec<ServerRow>>;

    async fn close(&self) -> BalancerResult<()>;
}

/// Opens physical connections. Timeouts are applied by the caller.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: ClusterConnection;

    async fn connect(&self, addr: &HostAddr) -> BalancerResult<Self::Connection>;
}
