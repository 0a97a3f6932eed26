//! Connections handed out by the factory.

use std::ops::Deref;

use serde::Serialize;

use crate::error::BalancerResult;
use crate::net::{ClusterConnection, ConnectionLease, HostAddr, LeaseId};

/// How a connection was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectMode {
    /// Chosen by the balancer; holds a count lease.
    LoadBalanced,
    /// Opened straight through the configured seeds.
    SingleHost,
}

/// An open connection plus its count reservation.
///
/// The reservation is released when the connection is closed or dropped.
#[derive(Debug)]
pub struct BalancedConnection<T: ClusterConnection> {
    inner: T,
    addr: HostAddr,
    mode: ConnectMode,
    lease: Option<ConnectionLease>,
}

impl<T: ClusterConnection> BalancedConnection<T> {
    pub(crate) fn load_balanced(inner: T, addr: HostAddr, lease: ConnectionLease) -> Self {
        Self {
            inner,
            addr,
            mode: ConnectMode::LoadBalanced,
            lease: Some(lease),
        }
    }

    pub(crate) fn single_host(inner: T, addr: HostAddr) -> Self {
        Self {
            inner,
            addr,
            mode: ConnectMode::SingleHost,
            lease: None,
        }
    }

    pub fn addr(&self) -> &HostAddr {
        &self.addr
    }

    pub fn mode(&self) -> ConnectMode {
        self.mode
    }

    pub fn lease_id(&self) -> Option<LeaseId> {
        self.lease.as_ref().map(ConnectionLease::id)
    }

    /// Closes the connection, then releases the reservation.
    pub async fn close(self) -> BalancerResult<()> {
        let Self { inner, lease, .. } = self;
        let result = inner.close().await;
        drop(lease);
        result
    }
}

impl<T: ClusterConnection> Deref for BalancedConnection<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
