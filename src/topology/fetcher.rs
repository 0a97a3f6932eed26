//! Cluster topology fetch over a control connection.

use tracing::{debug, warn};

use crate::error::{BalancerError, BalancerResult};
use crate::net::ClusterConnection;
use crate::topology::member::ClusterMember;

/// Metadata query listing every live member of the cluster.
pub const SERVERS_QUERY: &str = "select * from yb_servers()";

/// Runs the servers query and types the rows.
///
/// Rows with neither a private nor a public address are dropped.
pub async fn fetch_topology<C>(conn: &C) -> BalancerResult<Vec<ClusterMember>>
where
    C: ClusterConnection + ?Sized,
{
    let rows = conn.query_servers().await.map_err(|e| match e {
        BalancerError::TopologyQuery(_) => e,
        other => BalancerError::topology_query(other.to_string()),
    })?;

    let total = rows.len();
    let members: Vec<ClusterMember> = rows
        .iter()
        .map(ClusterMember::from_row)
        .filter(|m| m.host.is_some() || m.public_ip.is_some())
        .collect();

    if members.len() < total {
        warn!(
            control = %conn.host(),
            dropped = total - members.len(),
            "Servers query returned rows without an address"
        );
    }
    debug!(control = %conn.host(), members = members.len(), "Fetched cluster topology");

    Ok(members)
}
