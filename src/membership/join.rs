//! Join handler: admission of new peers and the JoinAck flood.

use tracing::{debug, info};

use super::engine::ProtocolEngine;
use super::protocol::{GossipMessage, sanitize_snapshot};
use super::types::{Endpoint, MembershipEntry, MembershipEvent, NodeState};

impl ProtocolEngine {
    /// Add the requester unconditionally, then answer with the whole table or,
    /// once the group is full, with a sample that always includes this node.
    pub(super) fn handle_join_request(&mut self, sender: Endpoint, heartbeat: i64, now: i64) {
        if sender == self.local {
            debug!(node = %self.local, "Ignoring JoinRequest from self");
            return;
        }

        if self
            .table
            .push(MembershipEntry::new(sender, heartbeat.max(0), now))
        {
            self.record(MembershipEvent::Joined {
                observer: self.local,
                endpoint: sender,
                at: now,
            });
        }

        let group_max = self.config.group_max;
        let snapshot = if self.table.len() < group_max {
            self.table.entries().to_vec()
        } else {
            self.table.sample(group_max, &mut self.rng)
        };

        debug!(
            node = %self.local,
            "Replying to JoinRequest from {} with {} of {} entries",
            sender,
            snapshot.len(),
            self.table.len()
        );

        let reply = GossipMessage::JoinReply {
            sender: self.local,
            snapshot,
        };
        self.send(sender, &reply);
    }

    /// Merge the introducer's snapshot, become a member and announce ourselves.
    pub(super) fn handle_join_reply(
        &mut self,
        sender: Endpoint,
        snapshot: Vec<MembershipEntry>,
        now: i64,
    ) {
        if self.state != NodeState::AwaitingAdmission {
            debug!(node = %self.local, "Ignoring JoinReply from {} in state {:?}", sender, self.state);
            return;
        }

        let snapshot = sanitize_snapshot(snapshot, now);
        for endpoint in self.table.extend(snapshot) {
            self.record(MembershipEvent::Joined {
                observer: self.local,
                endpoint,
                at: now,
            });
        }

        self.state = NodeState::Member;
        self.admitted_at = Some(now);
        info!(
            node = %self.local,
            "Admitted via {} at tick {} ({} entries)",
            sender,
            now,
            self.table.len()
        );

        self.broadcast_join_ack(self.config.ttl);
    }

    /// Capacity-bounded flood announcing a newly admitted peer.
    ///
    /// A JoinAck with ttl 0 is absorbed. A known sender triggers a relay with
    /// `ttl - 1`; an unknown one is added first when the table has room.
    pub(super) fn handle_join_ack(&mut self, sender: Endpoint, heartbeat: i64, ttl: i64, now: i64) {
        if self.state != NodeState::Member || ttl <= 0 || sender == self.local {
            return;
        }

        if self.table.contains_peer(&sender) {
            if !self.config.suppress_duplicate_floods {
                self.broadcast_join_ack(ttl - 1);
            }
            return;
        }

        if !self.table.has_room(self.config.group_max) {
            debug!(node = %self.local, "Table full, not adding {} from JoinAck", sender);
            return;
        }

        self.table
            .push(MembershipEntry::new(sender, heartbeat.max(0), now));
        self.record(MembershipEvent::Joined {
            observer: self.local,
            endpoint: sender,
            at: now,
        });
        self.broadcast_join_ack(ttl - 1);
    }

    /// Announce this node to every peer. Relays carry the relaying node as
    /// sender.
    pub(super) fn broadcast_join_ack(&self, ttl: i64) {
        let ack = GossipMessage::JoinAck {
            sender: self.local,
            heartbeat: self.table.local().heartbeat,
            ttl,
        };
        self.broadcast(&ack);
    }
}
