//! Client-side connection balancing for distributed SQL clusters.
//!
//! Discovers cluster members through a control connection, spreads new
//! connections with least-connections selection, ranks members by placement
//! preference, and quarantines hosts that fail to connect.

pub mod config;
pub mod error;
pub mod health;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod orchestrator;
pub mod placement;
pub mod topology;

pub use config::schema::BalancerConfig;
pub use error::{BalancerError, BalancerResult};
pub use load_balancer::{BalancerRegistry, LoadBalancer};
pub use orchestrator::{BalancedConnection, ConnectMode, ConnectionFactory};
pub use placement::{PlacementDescriptor, PlacementPreference, Priority};
