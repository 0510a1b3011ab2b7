use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a process in the group: (host id, port).
///
/// Endpoints are the dedup/merge key of the membership table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    pub id: i32,
    pub port: i16,
}

impl Endpoint {
    pub const fn new(id: i32, port: i16) -> Self {
        Self { id, port }
    }

    /// The well-known bootstrap endpoint every node joins through.
    pub const fn introducer() -> Self {
        Self { id: 1, port: 0 }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.port)
    }
}

/// One peer's last-known liveness state, as seen by the local node.
///
/// `suspected_since` holds the tick at which the failure detector (or an
/// inbound Fail notice) flagged the entry. It never travels on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MembershipEntry {
    pub endpoint: Endpoint,
    pub heartbeat: i64,
    pub last_update: i64,

    #[serde(skip)]
    pub suspected_since: Option<i64>,
}

impl MembershipEntry {
    pub fn new(endpoint: Endpoint, heartbeat: i64, last_update: i64) -> Self {
        Self {
            endpoint,
            heartbeat,
            last_update,
            suspected_since: None,
        }
    }

    pub fn is_suspected(&self) -> bool {
        self.suspected_since.is_some()
    }
}

/// Lifecycle of the local node, driven only by the protocol engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NodeState {
    NotStarted,
    AwaitingAdmission,
    Member,
    Crashed,
}

impl NodeState {
    /// True for the states that process inbound traffic.
    pub fn accepts_traffic(&self) -> bool {
        matches!(self, NodeState::AwaitingAdmission | NodeState::Member)
    }
}

/// Diagnostic record of a membership change observed by one node.
///
/// Events have no protocol effect; drivers drain them for reporting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MembershipEvent {
    Joined {
        observer: Endpoint,
        endpoint: Endpoint,
        at: i64,
    },
    Suspected {
        observer: Endpoint,
        endpoint: Endpoint,
        at: i64,
    },
    Removed {
        observer: Endpoint,
        endpoint: Endpoint,
        at: i64,
    },
}

impl MembershipEvent {
    pub fn observer(&self) -> Endpoint {
        match self {
            MembershipEvent::Joined { observer, .. }
            | MembershipEvent::Suspected { observer, .. }
            | MembershipEvent::Removed { observer, .. } => *observer,
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        match self {
            MembershipEvent::Joined { endpoint, .. }
            | MembershipEvent::Suspected { endpoint, .. }
            | MembershipEvent::Removed { endpoint, .. } => *endpoint,
        }
    }
}
