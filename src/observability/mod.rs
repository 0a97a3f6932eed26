//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Balancer, orchestrator, quarantine produce:
//!     → tracing events (structured key-value fields)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, binary only)
//!     → Prometheus text via the installed recorder
//! ```
//!
//! # Design Decisions
//! - Metrics are cheap (facade calls, no-op without a recorder)
//! - Host is the only high-cardinality label

pub mod logging;
pub mod metrics;
