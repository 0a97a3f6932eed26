//! Least-connections strategy with optional placement tiers.
//!
//! # Responsibilities
//! - Refresh membership from a control connection, serialized per balancer
//! - Select the least-loaded host of the best available tier
//! - Quarantine failed hosts and report preemption opportunities
//!
//! # Design Decisions
//! - One type for both uniform and topology-aware balancing; without a
//!   preference every host sits in tier 1
//! - State lives behind a `parking_lot::Mutex` that is never held across `.await`
//! - Refresh holds a separate async lock; the topology query runs outside the state lock

use std::collections::HashSet;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::schema::LoadBalanceConfig;
use crate::load_balancer::state::{BalancerSnapshot, BalancerState};
use crate::load_balancer::HostKey;
use crate::net::{ClusterConnection, HostAddr, DEFAULT_PORT};
use crate::observability::metrics;
use crate::placement::PlacementPreference;
use crate::topology::fetch_topology;

/// Refresh interval used when the configured one is out of range.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;
/// Largest accepted refresh interval.
pub const MAX_REFRESH_INTERVAL_SECS: i64 = 600;
pub const DEFAULT_FAILED_HOST_TTL_SECS: u64 = 5;

/// Clamps a configured refresh interval: `0..=600` is kept, anything else is 300.
pub fn clamp_refresh_interval(secs: i64) -> Duration {
    if (0..=MAX_REFRESH_INTERVAL_SECS).contains(&secs) {
        Duration::from_secs(secs as u64)
    } else {
        Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalancerSettings {
    /// Zero refreshes on every request.
    pub refresh_interval: Duration,
    pub failed_host_ttl: Duration,
    /// Port for members that do not report one.
    pub default_port: u16,
}

impl BalancerSettings {
    pub fn from_config(config: &LoadBalanceConfig, default_port: u16) -> Self {
        Self {
            refresh_interval: clamp_refresh_interval(config.refresh_interval_secs),
            failed_host_ttl: Duration::from_secs(config.failed_host_ttl_secs),
            default_port,
        }
    }
}

impl Default for BalancerSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            failed_host_ttl: Duration::from_secs(DEFAULT_FAILED_HOST_TTL_SECS),
            default_port: DEFAULT_PORT,
        }
    }
}

/// Balancer shared by every connection request of one configuration.
#[derive(Debug)]
pub struct LoadBalancer {
    preference: Option<PlacementPreference>,
    settings: BalancerSettings,
    state: Mutex<BalancerState>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl LoadBalancer {
    pub fn new(preference: Option<PlacementPreference>, settings: BalancerSettings) -> Self {
        Self {
            preference,
            settings,
            state: Mutex::new(BalancerState::new()),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Balancer without placement tiers.
    pub fn uniform(settings: BalancerSettings) -> Self {
        Self::new(None, settings)
    }

    pub fn preference(&self) -> Option<&PlacementPreference> {
        self.preference.as_ref()
    }

    pub fn settings(&self) -> &BalancerSettings {
        &self.settings
    }

    pub fn needs_refresh(&self) -> bool {
        match self.state.lock().last_refresh_at() {
            None => true,
            Some(at) => at.elapsed() >= self.settings.refresh_interval,
        }
    }

    pub fn has_snapshot(&self) -> bool {
        self.state.lock().has_snapshot()
    }

    /// Refreshes membership through `conn` if the interval has elapsed.
    ///
    /// Returns false only when the topology query failed; the refresh
    /// timestamp is left alone so the next request retries. A caller that
    /// finds another refresh in flight proceeds with the current snapshot,
    /// unless there is none yet.
    pub async fn refresh<C>(&self, conn: &C) -> bool
    where
        C: ClusterConnection + ?Sized,
    {
        if !self.needs_refresh() {
            metrics::record_refresh("skipped");
            return true;
        }

        let _guard = match self.refresh_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) if self.has_snapshot() => {
                metrics::record_refresh("skipped");
                return true;
            }
            Err(_) => self.refresh_lock.lock().await,
        };

        if !self.needs_refresh() {
            return true;
        }

        debug!(control = %conn.host(), "Refreshing cluster topology");
        let members = match fetch_topology(conn).await {
            Ok(members) => members,
            Err(e) => {
                warn!(control = %conn.host(), error = %e, "Topology refresh failed");
                metrics::record_refresh("failed");
                return false;
            }
        };

        let summary = self.state.lock().apply_snapshot(
            members,
            conn.host(),
            self.preference.as_ref(),
            self.settings.default_port,
            self.settings.failed_host_ttl,
            Instant::now(),
        );
        metrics::record_refresh("ok");
        info!(
            members = summary.members,
            added = summary.added.len(),
            removed = summary.removed.len(),
            released = summary.released.len(),
            "Topology refreshed"
        );
        true
    }

    /// Makes the next `refresh` run regardless of the interval.
    pub fn force_refresh(&self) {
        self.state.lock().force_refresh();
    }

    pub fn select_host(&self) -> Option<HostKey> {
        self.select_target(&HashSet::new()).map(|(host, _)| host)
    }

    /// Candidate for a new connection, skipping `excluding`.
    pub fn select_target(&self, excluding: &HashSet<HostKey>) -> Option<(HostKey, HostAddr)> {
        self.state.lock().select(excluding)
    }

    /// Selects a candidate and counts a connection against it under one
    /// lock, so concurrent callers see each other's choices.
    pub fn select_and_reserve(&self, excluding: &HashSet<HostKey>) -> Option<(HostKey, HostAddr)> {
        let (selected, count) = {
            let mut state = self.state.lock();
            let selected = state.select_and_reserve(excluding)?;
            let count = state.connection_count(&selected.0);
            (selected, count)
        };
        if let Some(count) = count {
            metrics::record_host_connections(&selected.0, count);
        }
        Some(selected)
    }

    /// True if an eligible host ranks strictly better than `host`.
    pub fn has_more_preferred_node(&self, host: &str) -> bool {
        self.preference.is_some() && self.state.lock().has_more_preferred(host)
    }

    pub fn mark_failed(&self, host: &str) {
        if self.state.lock().mark_failed(host, Instant::now()) {
            warn!(host = %host, "Host quarantined");
            metrics::record_quarantined(host);
        }
    }

    /// Adjusts the tracked connection count; unknown hosts are ignored.
    pub fn adjust_connections(&self, host: &str, delta: i64) {
        let count = self.state.lock().adjust(host, delta);
        match count {
            Some(count) => metrics::record_host_connections(host, count),
            None => debug!(host = %host, delta, "Count adjustment for untracked host ignored"),
        }
    }

    pub fn connection_count(&self, host: &str) -> Option<u64> {
        self.state.lock().connection_count(host)
    }

    pub fn is_selectable(&self, host: &str) -> bool {
        self.state.lock().is_selectable(host)
    }

    /// Control-connection candidates: `seeds` first, then known members.
    pub fn bootstrap_candidates(&self, seeds: &[HostAddr]) -> Vec<HostAddr> {
        let mut candidates: Vec<HostAddr> = seeds.to_vec();
        let state = self.state.lock();
        for addr in state.member_addrs() {
            if !candidates.contains(addr) {
                candidates.push(addr.clone());
            }
        }
        candidates
    }

    /// Upper bound on preemption rounds: declared tiers plus rest of cluster.
    pub fn rank_count(&self) -> usize {
        self.preference
            .as_ref()
            .map(|p| p.tier_count() + 1)
            .unwrap_or(1)
    }

    pub fn snapshot(&self) -> BalancerSnapshot {
        self.state.lock().snapshot()
    }
}
