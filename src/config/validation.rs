//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check seed addresses and timeouts
//! - Parse placement text early so bad ranks never reach a connect
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Out-of-range refresh intervals are clamped later, not rejected here

use std::fmt;

use crate::config::schema::BalancerConfig;
use crate::net::HostAddr;
use crate::placement::PlacementPreference;

/// A single semantic problem in a config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.cluster.seeds.is_empty() {
        errors.push(ValidationError::new("cluster.seeds", "at least one seed is required"));
    }
    for seed in &config.cluster.seeds {
        if let Err(e) = HostAddr::parse(seed, config.cluster.default_port) {
            errors.push(ValidationError::new("cluster.seeds", e.to_string()));
        }
    }
    if config.cluster.default_port == 0 {
        errors.push(ValidationError::new("cluster.default_port", "must be non-zero"));
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be greater than 0"));
    }

    if let Some(keys) = &config.load_balance.topology_keys {
        if let Err(e) = PlacementPreference::parse(keys) {
            errors.push(ValidationError::new("load_balance.topology_keys", e.to_string()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
