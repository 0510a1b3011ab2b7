//! Gossip disseminator: full-table anti-entropy push and merge.

use tracing::trace;

use super::engine::ProtocolEngine;
use super::protocol::{GossipMessage, sanitize_snapshot};
use super::table::MergeOutcome;
use super::types::{Endpoint, MembershipEntry, MembershipEvent, NodeState};

impl ProtocolEngine {
    /// Push the entire table to every peer.
    pub(super) fn gossip_round(&self) {
        let msg = GossipMessage::Gossip {
            sender: self.local,
            snapshot: self.table.entries().to_vec(),
        };
        self.broadcast(&msg);
    }

    /// Merge a peer's snapshot, ignoring entries older than
    /// `gossip_staleness` ticks.
    pub(super) fn handle_gossip(
        &mut self,
        sender: Endpoint,
        snapshot: Vec<MembershipEntry>,
        now: i64,
    ) {
        if self.state != NodeState::Member {
            return;
        }

        let staleness = self.config.gossip_staleness;
        let group_max = self.config.group_max;

        for entry in sanitize_snapshot(snapshot, now) {
            if now - entry.last_update > staleness {
                continue;
            }

            if self.table.merge_entry(&entry, group_max) == MergeOutcome::Added {
                self.record(MembershipEvent::Joined {
                    observer: self.local,
                    endpoint: entry.endpoint,
                    at: now,
                });
            }
        }

        trace!(node = %self.local, "Merged gossip from {} ({} entries)", sender, self.table.len());
    }
}
