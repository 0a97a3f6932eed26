//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestrator picks a HostAddr
//!     → connection.rs (reserve a count lease)
//!     → transport.rs Connector::connect (wire-protocol client, external)
//!     → ClusterConnection handed back to the caller with its lease
//!
//! memory.rs implements the transport traits in-process.
//! ```
//!
//! # Design Decisions
//! - The protocol client is a trait seam; this crate never opens sockets itself
//! - Count reservations are RAII so cancellation cannot leak them

pub mod connection;
pub mod memory;
pub mod transport;

pub use connection::{ConnectionLease, LeaseId};
pub use transport::{ClusterConnection, Connector, HostAddr, DEFAULT_PORT};
