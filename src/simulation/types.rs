use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::membership::config::ProtocolConfig;
use crate::membership::types::{Endpoint, MembershipEntry, MembershipEvent, NodeState};

/// Parameters of one simulated run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of nodes; endpoints are `(1,0)..(nodes,0)`
    pub nodes: usize,
    /// Ticks between consecutive node starts
    pub join_interval: i64,
    /// Tick at which nodes are crashed (none when unset)
    pub crash_at: Option<i64>,
    /// How many non-introducer nodes crash at `crash_at`
    pub crash_count: usize,
    /// Length of the run
    pub total_ticks: i64,
    /// Probability that the network loses a message
    pub drop_probability: f64,
    /// Seed for message loss and crash selection
    pub seed: u64,
    /// Re-send the JoinRequest every this many ticks while waiting (0 disables)
    pub join_retry: i64,
    pub protocol: ProtocolConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            nodes: 10,
            join_interval: 1,
            crash_at: Some(100),
            crash_count: 1,
            total_ticks: 700,
            drop_probability: 0.0,
            seed: 0,
            join_retry: 0,
            protocol: ProtocolConfig::default(),
        }
    }
}

impl SimulationConfig {
    pub fn from_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.nodes > 0, "simulation needs at least one node");
        anyhow::ensure!(
            self.crash_count < self.nodes,
            "cannot crash {} of {} nodes (the introducer never crashes)",
            self.crash_count,
            self.nodes
        );
        anyhow::ensure!(self.join_interval >= 0, "join_interval must not be negative");
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.drop_probability),
            "drop_probability must be within [0, 1]"
        );
        self.protocol.validate()?;
        Ok(())
    }
}

/// Final view of one node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub endpoint: Endpoint,
    pub state: NodeState,
    pub heartbeat: i64,
    pub table: Vec<MembershipEntry>,
}

impl NodeReport {
    pub fn knows(&self, endpoint: &Endpoint) -> bool {
        self.table.iter().any(|entry| &entry.endpoint == endpoint)
    }
}

/// Outcome of a simulated run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub ticks: i64,
    pub crashed: Vec<Endpoint>,
    pub nodes: Vec<NodeReport>,
    pub events: Vec<MembershipEvent>,
    pub messages_sent: u64,
    pub messages_dropped: u64,
}

impl SimulationReport {
    pub fn live(&self) -> impl Iterator<Item = &NodeReport> {
        self.nodes
            .iter()
            .filter(|node| node.state == NodeState::Member)
    }

    pub fn node(&self, endpoint: &Endpoint) -> Option<&NodeReport> {
        self.nodes.iter().find(|node| &node.endpoint == endpoint)
    }

    /// No live node still lists a crashed endpoint.
    pub fn failures_detected(&self) -> bool {
        self.live()
            .all(|node| self.crashed.iter().all(|crashed| !node.knows(crashed)))
    }

    /// Every live node lists every other live node.
    pub fn is_complete(&self) -> bool {
        let live: HashSet<Endpoint> = self.live().map(|node| node.endpoint).collect();
        self.live()
            .all(|node| live.iter().all(|endpoint| node.knows(endpoint)))
    }

    /// Removal events for `endpoint`, one per observer that dropped it.
    pub fn removals_of(&self, endpoint: &Endpoint) -> Vec<&MembershipEvent> {
        self.events
            .iter()
            .filter(|event| {
                matches!(event, MembershipEvent::Removed { .. }) && &event.endpoint() == endpoint
            })
            .collect()
    }

    /// Observers that recorded `endpoint` joining.
    pub fn join_observers(&self, endpoint: &Endpoint) -> HashSet<Endpoint> {
        self.events
            .iter()
            .filter(|event| {
                matches!(event, MembershipEvent::Joined { .. }) && &event.endpoint() == endpoint
            })
            .map(MembershipEvent::observer)
            .collect()
    }
}
