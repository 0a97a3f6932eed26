//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → BalancerConfig (validated, immutable)
//!
//! connection URL
//!     → url.rs (hosts + balancing options)
//!     → BalancerConfig
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod url;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{BalancerConfig, ClusterConfig, LoadBalanceConfig, ObservabilityConfig, TimeoutConfig};
pub use self::url::parse_connection_url;
