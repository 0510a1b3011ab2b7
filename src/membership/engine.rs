use bytes::Bytes;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::config::ProtocolConfig;
use super::error::{MembershipError, Result};
use super::protocol::{GossipMessage, MessageCodec};
use super::table::MembershipTable;
use super::types::{Endpoint, MembershipEntry, MembershipEvent, NodeState};
use crate::transport::{Clock, Transport};

/// Membership protocol run by one node.
///
/// The engine owns the node's membership table and suspicion state. It is
/// driven cooperatively: an external scheduler calls [`ProtocolEngine::tick`]
/// once per round, which first drains the inbound queue in arrival order and
/// then, once the node is a member, runs the maintenance round
/// (heartbeat -> failure detection -> cleanup -> gossip fan-out).
pub struct ProtocolEngine {
    pub(super) local: Endpoint,
    pub(super) config: ProtocolConfig,
    pub(super) codec: MessageCodec,
    pub(super) state: NodeState,
    pub(super) table: MembershipTable,
    pub(super) admitted_at: Option<i64>,
    pub(super) rng: StdRng,
    inbox: VecDeque<Bytes>,
    malformed: u64,
    events: Vec<MembershipEvent>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
}

impl ProtocolEngine {
    pub fn new(
        local: Endpoint,
        config: ProtocolConfig,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let rng = match config.sample_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let now = clock.now();

        Ok(Self {
            local,
            codec: MessageCodec::new(config.noise_shift),
            config,
            state: NodeState::NotStarted,
            table: MembershipTable::new(local, now),
            admitted_at: None,
            rng,
            inbox: VecDeque::new(),
            malformed: 0,
            events: Vec::new(),
            transport,
            clock,
        })
    }

    pub fn local_endpoint(&self) -> Endpoint {
        self.local
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn table(&self) -> &MembershipTable {
        &self.table
    }

    /// Endpoints of every non-suspected entry, local node included.
    pub fn members(&self) -> Vec<Endpoint> {
        self.table
            .entries()
            .iter()
            .filter(|entry| !entry.is_suspected())
            .map(|entry| entry.endpoint)
            .collect()
    }

    pub fn is_suspected(&self, endpoint: &Endpoint) -> bool {
        self.table
            .get(endpoint)
            .is_some_and(MembershipEntry::is_suspected)
    }

    /// Take every membership event recorded since the last call.
    pub fn drain_events(&mut self) -> Vec<MembershipEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Bootstrap the node.
    ///
    /// The introducer itself becomes a member immediately. Everyone else sends a
    /// JoinRequest to the introducer and waits for the reply; calling `start`
    /// again while still waiting re-sends the request.
    pub fn start(&mut self, introducer: Endpoint) -> Result<()> {
        match self.state {
            NodeState::Crashed => return Err(MembershipError::Crashed),
            NodeState::Member => {
                debug!(node = %self.local, "start ignored, already a member");
                return Ok(());
            }
            NodeState::NotStarted | NodeState::AwaitingAdmission => {}
        }

        let now = self.now();
        if self.local == introducer {
            info!(node = %self.local, "Starting up group at tick {}", now);
            self.table = MembershipTable::new(self.local, now);
            self.state = NodeState::Member;
            self.admitted_at = Some(now);
            return Ok(());
        }

        info!(node = %self.local, "Attempting to join via {}", introducer);
        self.state = NodeState::AwaitingAdmission;
        let request = GossipMessage::JoinRequest {
            sender: self.local,
            heartbeat: self.table.local().heartbeat,
        };
        self.send(introducer, &request);
        Ok(())
    }

    /// Crash the node. Permanent: inbound traffic is discarded and `tick`
    /// becomes a no-op.
    pub fn crash(&mut self) {
        if self.state != NodeState::Crashed {
            warn!(node = %self.local, "Node crashed at tick {}", self.now());
        }
        self.state = NodeState::Crashed;
        self.inbox.clear();
    }

    /// Queue an inbound payload for the next tick.
    pub fn enqueue(&mut self, payload: Bytes) {
        if self.state == NodeState::Crashed {
            return;
        }
        self.inbox.push_back(payload);
    }

    pub fn pending(&self) -> usize {
        self.inbox.len()
    }

    /// Inbound payloads dropped because they failed to decode.
    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    /// Run one protocol round.
    pub fn tick(&mut self) {
        if self.state == NodeState::Crashed {
            return;
        }

        let now = self.now();
        while let Some(payload) = self.inbox.pop_front() {
            self.receive(&payload, now);
        }

        if self.state == NodeState::Member {
            self.maintenance_round(now);
        }
    }

    /// Route a decoded message to its handler.
    pub fn dispatch(&mut self, msg: GossipMessage) {
        let now = self.now();
        self.handle(msg, now);
    }

    fn receive(&mut self, payload: &[u8], now: i64) {
        match self.codec.decode(payload) {
            Ok(msg) => self.handle(msg, now),
            Err(e) if e.is_decode_error() => {
                self.malformed += 1;
                debug!(
                    node = %self.local,
                    "Dropping malformed message ({} bytes): {}",
                    payload.len(),
                    e
                );
            }
            Err(e) => {
                warn!(node = %self.local, "Failed to read inbound message: {}", e);
            }
        }
    }

    fn handle(&mut self, msg: GossipMessage, now: i64) {
        if !self.state.accepts_traffic() {
            debug!(node = %self.local, "Ignoring {:?} in state {:?}", msg.kind(), self.state);
            return;
        }

        match msg {
            GossipMessage::JoinRequest { sender, heartbeat } => {
                self.handle_join_request(sender, heartbeat, now);
            }

            GossipMessage::JoinReply { sender, snapshot } => {
                self.handle_join_reply(sender, snapshot, now);
            }

            GossipMessage::JoinAck {
                sender,
                heartbeat,
                ttl,
            } => {
                self.handle_join_ack(sender, heartbeat, ttl, now);
            }

            GossipMessage::Gossip { sender, snapshot } => {
                self.handle_gossip(sender, snapshot, now);
            }

            GossipMessage::Fail {
                sender,
                failed,
                ttl,
            } => {
                self.handle_fail(sender, failed, ttl, now);
            }
        }
    }

    fn maintenance_round(&mut self, now: i64) {
        self.table.bump_local(now);
        self.detect_failures(now);
        self.cleanup(now);
        self.gossip_round();
    }

    pub(super) fn record(&mut self, event: MembershipEvent) {
        match &event {
            MembershipEvent::Joined { endpoint, at, .. } => {
                info!(node = %self.local, "Node {} joined at time {}", endpoint, at);
            }
            MembershipEvent::Suspected { endpoint, at, .. } => {
                warn!(node = %self.local, "Node {} suspected at time {}", endpoint, at);
            }
            MembershipEvent::Removed { endpoint, at, .. } => {
                info!(node = %self.local, "Node {} removed Node {} at time {}", self.local, endpoint, at);
            }
        }
        self.events.push(event);
    }

    pub(super) fn send(&self, to: Endpoint, msg: &GossipMessage) {
        let payload = self.codec.encode(msg);
        if let Err(e) = self.transport.send(self.local, to, payload) {
            warn!(node = %self.local, "Failed to send {:?} to {}: {}", msg.kind(), to, e);
        }
    }

    /// Send `msg` to every peer in the table.
    pub(super) fn broadcast(&self, msg: &GossipMessage) {
        let payload = self.codec.encode(msg);
        for peer in self.table.peer_endpoints() {
            if let Err(e) = self.transport.send(self.local, peer, payload.clone()) {
                warn!(node = %self.local, "Failed to broadcast {:?} to {}: {}", msg.kind(), peer, e);
            }
        }
    }
}
