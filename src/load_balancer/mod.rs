//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! ConnectionFactory built from config
//!     → registry.rs (one LoadBalancer per seed set + placement text)
//!
//! Connection request
//!     → strategy.rs refresh (control connection → topology → state.rs)
//!     → strategy.rs select_and_reserve (one state lock)
//!         - best tier with an eligible host (placement priority)
//!         - least_conn.rs (fewest tracked connections, random tie-break)
//!         - count incremented; lease held until the connection closes
//!     → mark_failed on connect failure (quarantine until TTL + refresh)
//! ```
//!
//! # Design Decisions
//! - Uniform balancing is the topology-aware case with a single tier
//! - All bookkeeping for one balancer sits behind one state lock
//! - Balancers with different signatures share nothing

pub mod least_conn;
pub mod registry;
pub mod state;
pub mod strategy;

/// Identity of a cluster member: its host, or `host:port` when it listens
/// off the default port. See [`HostAddr::key`](crate::net::HostAddr::key).
pub type HostKey = String;

pub use registry::{BalancerRegistry, ConfigSignature};
pub use state::{AddressFamily, BalancerSnapshot, HostSnapshot};
pub use strategy::{clamp_refresh_interval, BalancerSettings, LoadBalancer};
