//! Quarantine of hosts that failed a connect.
//!
//! # Responsibilities
//! - Record the first failure time per host
//! - Release hosts whose TTL has elapsed
//!
//! # Design Decisions
//! - Insert is put-if-absent; a repeat failure does not extend the TTL
//! - Expiry is evaluated lazily at refresh, there is no background timer
//! - Uses `tokio::time::Instant` so paused-clock tests control expiry

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::info;

use crate::load_balancer::HostKey;

#[derive(Debug, Default, Clone)]
pub struct Quarantine {
    entries: HashMap<HostKey, Instant>,
}

impl Quarantine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quarantines `host` as of `now`. Returns false if it already was.
    pub fn insert(&mut self, host: &str, now: Instant) -> bool {
        if self.entries.contains_key(host) {
            return false;
        }
        self.entries.insert(host.to_string(), now);
        true
    }

    pub fn contains(&self, host: &str) -> bool {
        self.entries.contains_key(host)
    }

    pub fn since(&self, host: &str) -> Option<Instant> {
        self.entries.get(host).copied()
    }

    /// Removes entries older than `ttl` and returns their hosts.
    pub fn release_expired(&mut self, now: Instant, ttl: Duration) -> Vec<HostKey> {
        let expired: Vec<HostKey> = self
            .entries
            .iter()
            .filter(|(_, at)| now.saturating_duration_since(**at) > ttl)
            .map(|(host, _)| host.clone())
            .collect();

        for host in &expired {
            self.entries.remove(host);
            info!(host = %host, "Quarantine expired, host eligible again");
        }
        expired
    }

    pub fn hosts(&self) -> impl Iterator<Item = &HostKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
