//! Membership table
//!
//! An ordered list of [`MembershipEntry`] whose first slot always holds the
//! local node. Every mutation that can introduce an endpoint twice ends with a
//! dedup pass, so after any merge no two entries share an endpoint (the first
//! occurrence wins).

use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;

use super::types::{Endpoint, MembershipEntry};

/// Outcome of merging a single incoming entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Added,
    Updated,
    Unchanged,
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MembershipTable {
    entries: Vec<MembershipEntry>,
}

impl MembershipTable {
    pub fn new(local: Endpoint, now: i64) -> Self {
        Self {
            entries: vec![MembershipEntry::new(local, 0, now)],
        }
    }

    pub fn local(&self) -> &MembershipEntry {
        &self.entries[0]
    }

    pub fn local_endpoint(&self) -> Endpoint {
        self.entries[0].endpoint
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[MembershipEntry] {
        &self.entries
    }

    /// Every entry except the local one.
    pub fn peers(&self) -> &[MembershipEntry] {
        &self.entries[1..]
    }

    /// Endpoints of every peer, in table order.
    pub fn peer_endpoints(&self) -> Vec<Endpoint> {
        self.peers().iter().map(|entry| entry.endpoint).collect()
    }

    pub fn get(&self, endpoint: &Endpoint) -> Option<&MembershipEntry> {
        self.entries.iter().find(|entry| &entry.endpoint == endpoint)
    }

    /// True when `endpoint` is a peer entry (the local slot is not consulted).
    pub fn contains_peer(&self, endpoint: &Endpoint) -> bool {
        self.peers().iter().any(|entry| &entry.endpoint == endpoint)
    }

    pub fn has_room(&self, group_max: usize) -> bool {
        self.entries.len() < group_max
    }

    /// Advance the local heartbeat by one and stamp it with `now`.
    pub fn bump_local(&mut self, now: i64) {
        let local = &mut self.entries[0];
        local.heartbeat += 1;
        local.last_update = now;
    }

    /// Append an entry, then dedup. Returns true if the endpoint was new.
    pub fn push(&mut self, entry: MembershipEntry) -> bool {
        let known = self.get(&entry.endpoint).is_some();
        self.entries.push(entry);
        self.dedup();
        !known
    }

    /// Append a batch of entries, then dedup once.
    pub fn extend(&mut self, entries: impl IntoIterator<Item = MembershipEntry>) -> Vec<Endpoint> {
        let mut added = Vec::new();
        for entry in entries {
            if self.get(&entry.endpoint).is_none() && !added.contains(&entry.endpoint) {
                added.push(entry.endpoint);
            }
            self.entries.push(entry);
        }
        self.dedup();
        added
    }

    /// Remove later duplicates of any endpoint, keeping the first occurrence.
    pub fn dedup(&mut self) {
        let mut seen = HashSet::with_capacity(self.entries.len());
        self.entries.retain(|entry| seen.insert(entry.endpoint));
    }

    /// Merge one gossiped entry.
    ///
    /// A known entry adopts the incoming heartbeat and timestamp only when both
    /// are strictly greater. Unknown entries are appended while the table has
    /// room. The local slot and suspected entries are never touched.
    pub fn merge_entry(&mut self, incoming: &MembershipEntry, group_max: usize) -> MergeOutcome {
        if incoming.endpoint == self.local_endpoint() {
            return MergeOutcome::Skipped;
        }

        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|entry| entry.endpoint == incoming.endpoint)
        {
            if existing.is_suspected() {
                return MergeOutcome::Skipped;
            }
            if incoming.heartbeat > existing.heartbeat && incoming.last_update > existing.last_update
            {
                existing.heartbeat = incoming.heartbeat;
                existing.last_update = incoming.last_update;
                return MergeOutcome::Updated;
            }
            return MergeOutcome::Unchanged;
        }

        if !self.has_room(group_max) {
            return MergeOutcome::Skipped;
        }

        let mut fresh = incoming.clone();
        fresh.suspected_since = None;
        self.push(fresh);
        MergeOutcome::Added
    }

    /// Flag the peer entry for `endpoint` as suspected at `now`.
    ///
    /// Returns false when there is no such peer or it was already suspected.
    pub fn suspect(&mut self, endpoint: &Endpoint, now: i64) -> bool {
        match self.entries[1..]
            .iter_mut()
            .find(|entry| &entry.endpoint == endpoint)
        {
            Some(entry) if !entry.is_suspected() => {
                entry.suspected_since = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Active peers whose last update is more than `timeout` ticks old.
    pub fn expired(&self, now: i64, timeout: i64) -> Vec<Endpoint> {
        self.peers()
            .iter()
            .filter(|entry| !entry.is_suspected() && now - entry.last_update > timeout)
            .map(|entry| entry.endpoint)
            .collect()
    }

    /// Physically remove suspected peers whose grace period has elapsed.
    pub fn remove_expired_suspects(&mut self, now: i64, t_cleanup: i64) -> Vec<Endpoint> {
        let mut removed = Vec::new();
        let local = self.local_endpoint();
        self.entries.retain(|entry| {
            let expired = entry.endpoint != local
                && entry
                    .suspected_since
                    .is_some_and(|since| now - since >= t_cleanup);
            if expired {
                removed.push(entry.endpoint);
            }
            !expired
        });
        removed
    }

    /// The local entry plus up to `group_max - 1` peers drawn uniformly
    /// without replacement.
    pub fn sample<R: Rng + ?Sized>(&self, group_max: usize, rng: &mut R) -> Vec<MembershipEntry> {
        let mut sample = Vec::with_capacity(group_max);
        sample.push(self.local().clone());
        sample.extend(
            self.peers()
                .choose_multiple(rng, group_max.saturating_sub(1))
                .cloned(),
        );

        let mut seen = HashSet::with_capacity(sample.len());
        sample.retain(|entry| seen.insert(entry.endpoint));
        sample
    }
}
