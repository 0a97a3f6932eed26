//! Placement subsystem.
//!
//! # Data Flow
//! ```text
//! topology-keys text
//!     → preference.rs (parse entries, validate ranks, group into tiers)
//!     → PlacementPreference (immutable)
//!
//! Member placement (cloud, region, zone)
//!     → descriptor.rs (case-insensitive match, zone wildcard)
//!     → preference.rs (lowest matching tier, else rest of cluster)
//! ```
//!
//! # Design Decisions
//! - Parsing fails fast; a bad rank never reaches connection time
//! - Tiers are kept in a BTreeMap so lookup order is rank order

pub mod descriptor;
pub mod preference;

pub use descriptor::PlacementDescriptor;
pub use preference::{PlacementPreference, Priority, MAX_PREFERENCE_VALUE};
