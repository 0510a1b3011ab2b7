use serde::Serialize;
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::membership::config::ProtocolConfig;
use crate::membership::engine::ProtocolEngine;
use crate::membership::types::{Endpoint, MembershipEvent, NodeState};
use crate::transport::udp::AddressPlan;

/// Events kept in a snapshot for the status endpoint.
pub const RECENT_EVENTS: usize = 32;

/// Everything needed to run one node as a process.
#[derive(Debug, Clone)]
pub struct NodeOptions {
    pub endpoint: Endpoint,
    pub plan: AddressPlan,
    /// Wall-clock length of one protocol tick
    pub tick_interval: Duration,
    /// Re-send the JoinRequest every this many ticks while waiting (0 disables)
    pub join_retry: i64,
    pub protocol: ProtocolConfig,
}

impl NodeOptions {
    pub fn new(endpoint: Endpoint, plan: AddressPlan) -> Self {
        Self {
            endpoint,
            plan,
            tick_interval: Duration::from_millis(200),
            join_retry: 10,
            protocol: ProtocolConfig::default(),
        }
    }

    /// Options for a node on the loopback interface.
    pub fn local(id: i32, base_port: u16) -> Self {
        Self::new(
            Endpoint::new(id, 0),
            AddressPlan::new(IpAddr::V4(Ipv4Addr::LOCALHOST), base_port),
        )
    }
}

/// One row of a node's membership table as exposed over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberView {
    pub endpoint: Endpoint,
    pub heartbeat: i64,
    pub last_update: i64,
    pub suspected: bool,
}

/// Point-in-time view of a running node, published after every tick.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub endpoint: Endpoint,
    pub state: NodeState,
    pub tick: i64,
    pub heartbeat: i64,
    /// Inbound payloads dropped as undecodable
    pub malformed: u64,
    pub members: Vec<MemberView>,
    pub recent_events: Vec<MembershipEvent>,
}

impl NodeSnapshot {
    pub fn capture(engine: &ProtocolEngine, recent: &VecDeque<MembershipEvent>) -> Self {
        let table = engine.table();
        Self {
            endpoint: engine.local_endpoint(),
            state: engine.state(),
            tick: engine.now(),
            heartbeat: table.local().heartbeat,
            malformed: engine.malformed(),
            members: table
                .entries()
                .iter()
                .map(|entry| MemberView {
                    endpoint: entry.endpoint,
                    heartbeat: entry.heartbeat,
                    last_update: entry.last_update,
                    suspected: entry.is_suspected(),
                })
                .collect(),
            recent_events: recent.iter().cloned().collect(),
        }
    }

    pub fn knows(&self, endpoint: &Endpoint) -> bool {
        self.members.iter().any(|member| &member.endpoint == endpoint)
    }
}
