use anyhow::Result;
use bytes::Bytes;
use std::collections::VecDeque;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::types::{NodeOptions, NodeSnapshot, RECENT_EVENTS};
use crate::membership::engine::ProtocolEngine;
use crate::membership::types::{Endpoint, MembershipEvent, NodeState};
use crate::transport::EpochClock;
use crate::transport::udp::UdpTransport;

const MAX_DATAGRAM: usize = 65536;
const RECV_BACKOFF_MIN: Duration = Duration::from_millis(10);
const RECV_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// A protocol engine bound to a UDP socket and driven by a wall-clock timer.
///
/// Ticks are counted from the Unix epoch, so every process configured with
/// the same tick interval stamps entries on the same timeline.
pub struct NodeService {
    options: NodeOptions,
    engine: ProtocolEngine,
    clock: EpochClock,
    socket: UdpSocket,
    local_addr: SocketAddr,
    recent: VecDeque<MembershipEvent>,
    snapshots: watch::Sender<NodeSnapshot>,
}

impl NodeService {
    /// Bind the node's socket. Must be called from inside a tokio runtime.
    pub fn bind(options: NodeOptions) -> Result<Self> {
        let bind_addr = options.plan.socket_addr(options.endpoint)?;
        let (transport, socket) = UdpTransport::bind(bind_addr, options.plan)?;
        let local_addr = transport.local_addr()?;

        let clock = EpochClock::new(options.tick_interval);
        let engine = ProtocolEngine::new(
            options.endpoint,
            options.protocol.clone(),
            Arc::new(transport),
            Arc::new(clock),
        )?;

        let recent = VecDeque::with_capacity(RECENT_EVENTS);
        let (snapshots, _) = watch::channel(NodeSnapshot::capture(&engine, &recent));

        info!(
            "Node {} bound to {}, ticking every {:?}",
            options.endpoint,
            local_addr,
            clock.tick_interval()
        );

        Ok(Self {
            options,
            engine,
            clock,
            socket,
            local_addr,
            recent,
            snapshots,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn subscribe(&self) -> watch::Receiver<NodeSnapshot> {
        self.snapshots.subscribe()
    }

    /// Join the group and run one round per clock tick until `shutdown`
    /// resolves.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send) -> Result<()> {
        let Self {
            options,
            mut engine,
            clock,
            socket,
            mut recent,
            snapshots,
            ..
        } = self;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let receive_handle = tokio::spawn(receive_loop(socket, tx));

        engine.start(Endpoint::introducer())?;
        let mut join_sent_at = engine.now();
        let mut last_round = None;

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Node {} shutting down at tick {}", options.endpoint, engine.now());
                    break;
                }
                _ = tokio::time::sleep(clock.until_next_tick()) => {
                    let now = engine.now();
                    if last_round == Some(now) {
                        continue;
                    }
                    last_round = Some(now);

                    while let Ok(payload) = rx.try_recv() {
                        engine.enqueue(payload);
                    }

                    retry_join(&mut engine, options.join_retry, &mut join_sent_at)?;
                    engine.tick();

                    for event in engine.drain_events() {
                        if recent.len() == RECENT_EVENTS {
                            recent.pop_front();
                        }
                        recent.push_back(event);
                    }

                    snapshots.send_replace(NodeSnapshot::capture(&engine, &recent));
                }
            }
        }

        receive_handle.abort();
        Ok(())
    }
}

/// Re-send the JoinRequest while the introducer has not answered.
fn retry_join(engine: &mut ProtocolEngine, every: i64, sent_at: &mut i64) -> Result<()> {
    let now = engine.now();
    if engine.state() == NodeState::AwaitingAdmission && every > 0 && now - *sent_at >= every {
        debug!("Still waiting for admission at tick {}, retrying", now);
        engine.start(Endpoint::introducer())?;
        *sent_at = now;
    }
    Ok(())
}

/// Delay before the next receive after a failed one.
pub(super) fn next_backoff(current: Option<Duration>) -> Duration {
    match current {
        None => RECV_BACKOFF_MIN,
        Some(delay) => (delay * 2).min(RECV_BACKOFF_MAX),
    }
}

async fn receive_loop(socket: UdpSocket, tx: mpsc::UnboundedSender<Bytes>) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    let mut backoff = None;

    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, src)) => {
                backoff = None;
                if tx.send(Bytes::copy_from_slice(&buf[..len])).is_err() {
                    debug!("Tick loop gone, dropping datagram from {}", src);
                    break;
                }
            }
            Err(e) => {
                let delay = next_backoff(backoff);
                warn!("Error receiving UDP packet, retrying in {:?}: {}", delay, e);
                backoff = Some(delay);
                tokio::time::sleep(delay).await;
            }
        }
    }
}
