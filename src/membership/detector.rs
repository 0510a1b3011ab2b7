//! Failure detector: timeouts, Fail notices and cleanup.

use tracing::debug;

use super::engine::ProtocolEngine;
use super::protocol::GossipMessage;
use super::types::{Endpoint, MembershipEvent, NodeState};

impl ProtocolEngine {
    /// Suspect every active peer that has not been updated for more than
    /// `timeout` ticks and flood a Fail notice for it.
    ///
    /// Nothing is checked during the first `t_fail` ticks after admission.
    pub(super) fn detect_failures(&mut self, now: i64) {
        if let Some(admitted_at) = self.admitted_at {
            if now - admitted_at < self.config.t_fail {
                return;
            }
        }

        for failed in self.table.expired(now, self.config.timeout) {
            if !self.table.suspect(&failed, now) {
                continue;
            }
            self.record(MembershipEvent::Suspected {
                observer: self.local,
                endpoint: failed,
                at: now,
            });

            let notice = GossipMessage::Fail {
                sender: self.local,
                failed,
                ttl: self.config.ttl,
            };
            self.broadcast(&notice);
        }
    }

    /// Mark the failed endpoint suspected and keep the flood going.
    ///
    /// Removal is left to [`ProtocolEngine::cleanup`]. Unless duplicate floods
    /// are suppressed, the notice is forwarded on every receipt.
    pub(super) fn handle_fail(&mut self, sender: Endpoint, failed: Endpoint, ttl: i64, now: i64) {
        if self.state != NodeState::Member || ttl <= 0 {
            return;
        }

        let newly_suspected = failed != self.local && self.table.suspect(&failed, now);
        if newly_suspected {
            self.record(MembershipEvent::Suspected {
                observer: self.local,
                endpoint: failed,
                at: now,
            });
        } else {
            debug!(node = %self.local, "Fail notice for {} from {} changed nothing", failed, sender);
        }

        if self.config.suppress_duplicate_floods && !newly_suspected {
            return;
        }

        let notice = GossipMessage::Fail {
            sender: self.local,
            failed,
            ttl: ttl - 1,
        };
        self.broadcast(&notice);
    }

    /// Remove suspected entries whose grace period has elapsed.
    pub(super) fn cleanup(&mut self, now: i64) {
        for removed in self
            .table
            .remove_expired_suspects(now, self.config.t_cleanup)
        {
            self.record(MembershipEvent::Removed {
                observer: self.local,
                endpoint: removed,
                at: now,
            });
        }
    }
}
