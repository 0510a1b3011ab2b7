//! Transport & Clock Module
//!
//! The protocol engine never touches sockets or wall time directly. It talks to
//! two collaborators:
//!
//! - **`Transport`**: fire-and-forget delivery of an encoded payload from one
//!   endpoint to another. Inbound payloads are pushed into the engine's queue by
//!   whoever owns the receiving side.
//! - **`Clock`**: the current tick. All protocol timers are measured in ticks,
//!   and timestamps from different nodes are only comparable when their clocks
//!   agree. Simulations share one [`TickClock`]; separate processes use an
//!   [`EpochClock`] derived from wall time.
//!
//! ## Submodules
//! - **`sim`**: In-memory network shared by every node of a simulation, with
//!   optional message loss.
//! - **`udp`**: Non-blocking UDP sender for real processes.

pub mod sim;
pub mod udp;

use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::membership::error::Result;
use crate::membership::types::Endpoint;

/// Outbound half of the network.
pub trait Transport: Send + Sync {
    fn send(&self, from: Endpoint, to: Endpoint, payload: Bytes) -> Result<()>;
}

/// Source of the current tick.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Shared, manually advanced tick counter.
///
/// Clones observe the same counter, so a simulation driver and every node it
/// runs agree on the time.
#[derive(Debug, Clone, Default)]
pub struct TickClock {
    tick: Arc<AtomicI64>,
}

impl TickClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(tick: i64) -> Self {
        Self {
            tick: Arc::new(AtomicI64::new(tick)),
        }
    }

    /// Move the clock forward by one tick and return the new value.
    pub fn advance(&self) -> i64 {
        self.tick.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Clock for TickClock {
    fn now(&self) -> i64 {
        self.tick.load(Ordering::SeqCst)
    }
}

/// Wall-clock ticks counted from the Unix epoch.
///
/// Tick `n` covers `[n * tick_interval, (n + 1) * tick_interval)` since the
/// epoch, so processes with synchronized clocks and the same interval agree
/// on the current tick no matter when they started.
#[derive(Debug, Clone, Copy)]
pub struct EpochClock {
    tick_millis: u64,
}

impl EpochClock {
    pub fn new(tick_interval: Duration) -> Self {
        Self {
            tick_millis: u64::try_from(tick_interval.as_millis())
                .unwrap_or(u64::MAX)
                .max(1),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }

    /// Time left until the next tick boundary.
    pub fn until_next_tick(&self) -> Duration {
        let elapsed = Self::epoch_millis();
        Duration::from_millis(self.tick_millis - elapsed % self.tick_millis)
    }

    fn epoch_millis() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|since| u64::try_from(since.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

impl Clock for EpochClock {
    fn now(&self) -> i64 {
        i64::try_from(Self::epoch_millis() / self.tick_millis).unwrap_or(i64::MAX)
    }
}
