//! Cluster topology discovery.
//!
//! # Data Flow
//! ```text
//! Control connection
//!     → fetcher.rs (run SERVERS_QUERY)
//!     → member.rs (column map → ClusterMember, empty values dropped)
//!     → LoadBalancer refresh
//! ```

pub mod fetcher;
pub mod member;

pub use fetcher::{fetch_topology, SERVERS_QUERY};
pub use member::{ClusterMember, ServerRow};
