//! Shared balancer state.
//!
//! # Responsibilities
//! - Hold the last topology snapshot
//! - Track per-host connection counts and quarantine
//! - Rank hosts by placement priority
//!
//! # Design Decisions
//! - Plain struct, always accessed under the owning `LoadBalancer`'s mutex
//! - Counts of hosts that drop out of the topology are stashed, not lost
//! - A quarantined host has no count and no priority, so it is never a candidate

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::health::Quarantine;
use crate::load_balancer::least_conn::LeastConnections;
use crate::load_balancer::HostKey;
use crate::net::HostAddr;
use crate::placement::{PlacementDescriptor, PlacementPreference, Priority};
use crate::topology::ClusterMember;

/// Which member address column the balancer connects through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Private,
    Public,
}

impl AddressFamily {
    fn is_public(self) -> bool {
        matches!(self, Self::Public)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberEntry {
    pub addr: HostAddr,
    pub placement: PlacementDescriptor,
}

/// Outcome of applying one topology snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub members: usize,
    pub added: Vec<HostKey>,
    pub removed: Vec<HostKey>,
    pub released: Vec<HostKey>,
}

#[derive(Debug, Default)]
pub struct BalancerState {
    members: BTreeMap<HostKey, MemberEntry>,
    connection_count: HashMap<HostKey, u64>,
    stashed_counts: HashMap<HostKey, u64>,
    quarantine: Quarantine,
    priority_of: HashMap<HostKey, Priority>,
    last_refresh_at: Option<Instant>,
    address_family: Option<AddressFamily>,
    snapshot_taken: bool,
}

impl BalancerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces membership with `members` and recomputes counts and priorities.
    pub fn apply_snapshot(
        &mut self,
        members: Vec<ClusterMember>,
        control_host: &str,
        preference: Option<&PlacementPreference>,
        default_port: u16,
        failed_host_ttl: Duration,
        now: Instant,
    ) -> SnapshotSummary {
        let released = self.quarantine.release_expired(now, failed_host_ttl);

        if self.address_family.is_none() {
            self.address_family = resolve_address_family(&members, control_host);
            if let Some(family) = self.address_family {
                info!(family = ?family, control = %control_host, "Resolved member address family");
            }
        }
        let public = self.address_family.map(AddressFamily::is_public).unwrap_or(false);

        let mut next: BTreeMap<HostKey, MemberEntry> = BTreeMap::new();
        for member in &members {
            let Some(host) = member.address(public) else {
                continue;
            };
            let addr = HostAddr::new(host, member.port.unwrap_or(default_port));
            next.insert(
                addr.key(default_port),
                MemberEntry {
                    addr,
                    placement: member.placement.clone(),
                },
            );
        }

        let removed: Vec<HostKey> = self
            .connection_count
            .keys()
            .filter(|h| !next.contains_key(*h))
            .cloned()
            .collect();
        for host in &removed {
            if let Some(count) = self.connection_count.remove(host) {
                self.stashed_counts.insert(host.clone(), count);
            }
        }

        let mut added = Vec::new();
        for host in next.keys() {
            if self.quarantine.contains(host) || self.connection_count.contains_key(host) {
                continue;
            }
            let count = self.stashed_counts.remove(host).unwrap_or(0);
            self.connection_count.insert(host.clone(), count);
            added.push(host.clone());
        }

        self.priority_of.clear();
        for (host, entry) in &next {
            if self.quarantine.contains(host) {
                continue;
            }
            let priority = preference
                .map(|p| p.priority_of(&entry.placement))
                .unwrap_or(Priority::Tier(1));
            self.priority_of.insert(host.clone(), priority);
        }

        self.members = next;
        self.last_refresh_at = Some(now);
        self.snapshot_taken = true;

        SnapshotSummary {
            members: self.members.len(),
            added,
            removed,
            released,
        }
    }

    fn eligible<'a>(
        &'a self,
        excluding: &'a HashSet<HostKey>,
    ) -> impl Iterator<Item = (&'a str, u64, Priority)> + 'a {
        self.connection_count.iter().filter_map(move |(host, count)| {
            if excluding.contains(host) || self.quarantine.contains(host) {
                return None;
            }
            let priority = *self.priority_of.get(host)?;
            Some((host.as_str(), *count, priority))
        })
    }

    /// Least-loaded host of the best tier that has an eligible member.
    pub fn select(&self, excluding: &HashSet<HostKey>) -> Option<(HostKey, HostAddr)> {
        let best = self.eligible(excluding).map(|(_, _, p)| p).min()?;
        let host = LeastConnections::new().pick(
            self.eligible(excluding)
                .filter(|(_, _, p)| *p == best)
                .map(|(h, c, _)| (h, c)),
        )?;
        debug!(host = %host, tier = %best, "Selected host");
        let addr = self.members.get(host)?.addr.clone();
        Some((host.to_string(), addr))
    }

    /// `select` plus a count increment on the chosen host, in one step.
    pub fn select_and_reserve(&mut self, excluding: &HashSet<HostKey>) -> Option<(HostKey, HostAddr)> {
        let (host, addr) = self.select(excluding)?;
        self.adjust(&host, 1);
        Some((host, addr))
    }

    pub fn has_more_preferred(&self, host: &str) -> bool {
        let Some(current) = self.priority_of.get(host).copied() else {
            return false;
        };
        let none = HashSet::new();
        let found = self
            .eligible(&none)
            .any(|(h, _, p)| h != host && p < current);
        found
    }

    /// Quarantines `host` and forgets its counts and priority.
    pub fn mark_failed(&mut self, host: &str, now: Instant) -> bool {
        let newly = self.quarantine.insert(host, now);
        self.connection_count.remove(host);
        self.stashed_counts.remove(host);
        self.priority_of.remove(host);
        newly
    }

    /// Adjusts the count of a tracked host, clamped at zero.
    ///
    /// Decrements also reach the stashed count of a host that left the
    /// topology, so it rejoins with its live connections only.
    pub fn adjust(&mut self, host: &str, delta: i64) -> Option<u64> {
        if delta < 0 {
            if let Some(stashed) = self.stashed_counts.get_mut(host) {
                *stashed = stashed.saturating_sub(delta.unsigned_abs());
                return None;
            }
        }
        let count = self.connection_count.get_mut(host)?;
        if delta < 0 {
            *count = count.saturating_sub(delta.unsigned_abs());
        } else {
            *count = count.saturating_add(delta as u64);
        }
        Some(*count)
    }

    pub fn is_selectable(&self, host: &str) -> bool {
        self.connection_count.contains_key(host)
            && self.priority_of.contains_key(host)
            && !self.quarantine.contains(host)
    }

    pub fn connection_count(&self, host: &str) -> Option<u64> {
        self.connection_count.get(host).copied()
    }

    pub fn priority(&self, host: &str) -> Option<Priority> {
        self.priority_of.get(host).copied()
    }

    pub fn is_quarantined(&self, host: &str) -> bool {
        self.quarantine.contains(host)
    }

    pub fn last_refresh_at(&self) -> Option<Instant> {
        self.last_refresh_at
    }

    pub fn force_refresh(&mut self) {
        self.last_refresh_at = None;
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot_taken
    }

    pub fn address_family(&self) -> Option<AddressFamily> {
        self.address_family
    }

    pub fn member_addrs(&self) -> impl Iterator<Item = &HostAddr> {
        self.members.values().map(|m| &m.addr)
    }

    pub fn snapshot(&self) -> BalancerSnapshot {
        let hosts: Vec<HostSnapshot> = self
            .members
            .iter()
            .map(|(host, entry)| HostSnapshot {
                host: host.clone(),
                port: entry.addr.port,
                placement: entry.placement.to_string(),
                connections: self.connection_count.get(host).copied(),
                priority: self.priority_of.get(host).copied(),
                quarantined: self.quarantine.contains(host),
            })
            .collect();

        let mut quarantined: Vec<HostKey> = self.quarantine.hosts().cloned().collect();
        quarantined.sort();

        BalancerSnapshot {
            hosts,
            quarantined,
            address_family: self.address_family,
            refreshed: self.snapshot_taken,
        }
    }
}

/// Family of the control connection's address, else private when no
/// member reports a public address, else undecided.
fn resolve_address_family(members: &[ClusterMember], control_host: &str) -> Option<AddressFamily> {
    if members.iter().any(|m| m.host.as_deref() == Some(control_host)) {
        return Some(AddressFamily::Private);
    }
    if members.iter().any(|m| m.public_ip.as_deref() == Some(control_host)) {
        return Some(AddressFamily::Public);
    }
    if members.iter().all(|m| m.public_ip.is_none()) {
        return Some(AddressFamily::Private);
    }
    None
}

/// Serializable view of a balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalancerSnapshot {
    pub hosts: Vec<HostSnapshot>,
    pub quarantined: Vec<HostKey>,
    pub address_family: Option<AddressFamily>,
    pub refreshed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostSnapshot {
    pub host: HostKey,
    pub port: u16,
    pub placement: String,
    pub connections: Option<u64>,
    pub priority: Option<Priority>,
    pub quarantined: bool,
}
