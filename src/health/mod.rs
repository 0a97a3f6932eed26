//! Host health tracking.
//!
//! # Data Flow
//! ```text
//! Connect to candidate fails
//!     → LoadBalancer::mark_failed
//!     → quarantine.rs (timestamp, put-if-absent)
//!
//! Next topology refresh
//!     → quarantine.rs (release entries older than the TTL)
//!     → host re-seeded if still reported by the cluster
//! ```
//!
//! # Design Decisions
//! - Failure detection is passive only; there are no probes
//! - One failed connect is enough to quarantine

pub mod quarantine;

pub use quarantine::Quarantine;
