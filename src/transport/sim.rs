//! In-memory network used by the simulation driver and the tests.

use bytes::Bytes;
use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use super::Transport;
use crate::membership::error::Result;
use crate::membership::types::Endpoint;

/// A payload waiting in a node's inbox.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub from: Endpoint,
    pub payload: Bytes,
}

/// Per-endpoint FIFO inboxes shared by every simulated node.
///
/// Sends never fail: payloads for endpoints nobody drains simply pile up until
/// [`SimNetwork::clear`] is called.
pub struct SimNetwork {
    inboxes: DashMap<Endpoint, VecDeque<Envelope>>,
    drop_probability: f64,
    rng: Mutex<StdRng>,
    sent: AtomicU64,
    dropped: AtomicU64,
}

impl SimNetwork {
    pub fn new() -> Self {
        Self::lossy(0.0, 0)
    }

    /// A network that loses each message with `drop_probability`.
    pub fn lossy(drop_probability: f64, seed: u64) -> Self {
        Self {
            inboxes: DashMap::new(),
            drop_probability: drop_probability.clamp(0.0, 1.0),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            sent: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Take every payload queued for `endpoint`, oldest first.
    pub fn drain(&self, endpoint: &Endpoint) -> Vec<Envelope> {
        match self.inboxes.get_mut(endpoint) {
            Some(mut inbox) => inbox.drain(..).collect(),
            None => Vec::new(),
        }
    }

    pub fn pending(&self, endpoint: &Endpoint) -> usize {
        self.inboxes.get(endpoint).map(|inbox| inbox.len()).unwrap_or(0)
    }

    /// Discard everything queued for `endpoint`.
    pub fn clear(&self, endpoint: &Endpoint) {
        self.inboxes.remove(endpoint);
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn should_drop(&self) -> bool {
        if self.drop_probability <= 0.0 {
            return false;
        }
        match self.rng.lock() {
            Ok(mut rng) => rng.gen_bool(self.drop_probability),
            Err(_) => false,
        }
    }
}

impl Default for SimNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SimNetwork {
    fn send(&self, from: Endpoint, to: Endpoint, payload: Bytes) -> Result<()> {
        self.sent.fetch_add(1, Ordering::Relaxed);

        if self.should_drop() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("Dropped message {} -> {}", from, to);
            return Ok(());
        }

        self.inboxes
            .entry(to)
            .or_default()
            .push_back(Envelope { from, payload });
        Ok(())
    }
}
