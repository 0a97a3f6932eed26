//! Connection orchestration.
//!
//! # Data Flow
//! ```text
//! ConnectionFactory::connect
//!     → control connection (cached, bootstrapped from seeds on demand)
//!     → LoadBalancer refresh / select / mark_failed
//!     → Connector::connect under the connect timeout
//!     → BalancedConnection (lease released on close or drop)
//! ```
//!
//! # Design Decisions
//! - Preemption is a bounded loop, one round per rank
//! - A failed topology query degrades to the single-host path instead of failing
//! - The control connection is never counted toward any host

pub mod balanced;
pub mod factory;

pub use balanced::{BalancedConnection, ConnectMode};
pub use factory::ConnectionFactory;
