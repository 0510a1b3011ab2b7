use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::{debug, info};

use super::types::{NodeReport, SimulationConfig, SimulationReport};
use crate::membership::engine::ProtocolEngine;
use crate::membership::types::{Endpoint, MembershipEvent, NodeState};
use crate::transport::{Clock, TickClock};
use crate::transport::sim::SimNetwork;

/// Runs a whole group of engines over a [`SimNetwork`] against one shared
/// logical clock.
pub struct Simulation {
    config: SimulationConfig,
    network: Arc<SimNetwork>,
    clock: TickClock,
    nodes: Vec<ProtocolEngine>,
    crashed: Vec<Endpoint>,
    events: Vec<MembershipEvent>,
    rng: StdRng,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> anyhow::Result<Self> {
        config.validate()?;

        let network = Arc::new(SimNetwork::lossy(config.drop_probability, config.seed));
        let clock = TickClock::new();

        let mut nodes = Vec::with_capacity(config.nodes);
        for index in 0..config.nodes {
            let endpoint = Endpoint::new(index as i32 + 1, 0);
            let protocol = match config.protocol.sample_seed {
                Some(seed) => config.protocol.clone().with_seed(seed.wrapping_add(index as u64)),
                None => config.protocol.clone(),
            };
            nodes.push(ProtocolEngine::new(
                endpoint,
                protocol,
                network.clone(),
                Arc::new(clock.clone()),
            )?);
        }

        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            network,
            clock,
            nodes,
            crashed: Vec::new(),
            events: Vec::new(),
        })
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub fn nodes(&self) -> &[ProtocolEngine] {
        &self.nodes
    }

    pub fn node(&self, endpoint: &Endpoint) -> Option<&ProtocolEngine> {
        self.nodes
            .iter()
            .find(|node| &node.local_endpoint() == endpoint)
    }

    /// Advance the whole group by one tick.
    ///
    /// Scheduled starts and crashes happen first. Then each node in endpoint
    /// order takes its queued payloads and runs its round, and finally the
    /// clock moves forward.
    pub fn step(&mut self) -> anyhow::Result<()> {
        let now = self.now();
        let introducer = Endpoint::introducer();

        for (index, node) in self.nodes.iter_mut().enumerate() {
            let start_at = index as i64 * self.config.join_interval;
            let retry = self.config.join_retry;
            let retry_due = node.state() == NodeState::AwaitingAdmission
                && retry > 0
                && now > start_at
                && (now - start_at) % retry == 0;

            if (node.state() == NodeState::NotStarted && now >= start_at) || retry_due {
                node.start(introducer)?;
            }
        }

        if self.config.crash_at == Some(now) {
            self.crash_nodes();
        }

        for node in self.nodes.iter_mut() {
            let endpoint = node.local_endpoint();
            if node.state() == NodeState::NotStarted {
                continue;
            }
            for envelope in self.network.drain(&endpoint) {
                node.enqueue(envelope.payload);
            }
            node.tick();
            self.events.extend(node.drain_events());
        }

        self.clock.advance();
        Ok(())
    }

    /// Step until `total_ticks` have elapsed and report the final state.
    pub fn run(mut self) -> anyhow::Result<SimulationReport> {
        info!(
            "Simulating {} nodes for {} ticks",
            self.config.nodes, self.config.total_ticks
        );

        while self.now() < self.config.total_ticks {
            self.step()?;
        }

        let report = self.report();
        info!(
            "Simulation finished: {} messages sent, {} dropped, {} events",
            report.messages_sent,
            report.messages_dropped,
            report.events.len()
        );
        Ok(report)
    }

    pub fn report(&self) -> SimulationReport {
        let nodes = self
            .nodes
            .iter()
            .map(|node| NodeReport {
                endpoint: node.local_endpoint(),
                state: node.state(),
                heartbeat: node.table().local().heartbeat,
                table: node.table().entries().to_vec(),
            })
            .collect();

        SimulationReport {
            ticks: self.now(),
            crashed: self.crashed.clone(),
            nodes,
            events: self.events.clone(),
            messages_sent: self.network.sent(),
            messages_dropped: self.network.dropped(),
        }
    }

    fn crash_nodes(&mut self) {
        let introducer = Endpoint::introducer();
        let candidates: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| {
                node.local_endpoint() != introducer && node.state() != NodeState::Crashed
            })
            .map(|(index, _)| index)
            .collect();

        let victims: Vec<usize> = candidates
            .choose_multiple(&mut self.rng, self.config.crash_count)
            .copied()
            .collect();

        for index in victims {
            let node = &mut self.nodes[index];
            let endpoint = node.local_endpoint();
            node.crash();
            self.network.clear(&endpoint);
            self.crashed.push(endpoint);
            debug!("Crashed {} at tick {}", endpoint, self.now());
        }
        self.crashed.sort();
    }
}
