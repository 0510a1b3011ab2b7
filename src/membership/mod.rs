//! Membership & Failure Detection Module
//!
//! Implements a gossip-based group membership protocol run independently by every
//! node. There is no coordinator: a well-known introducer admits new nodes, and
//! from then on membership converges through periodic full-table gossip.
//!
//! ## Core Mechanisms
//! - **Join Handshake**: JoinRequest -> JoinReply (full table or a sample once the
//!   group is full) -> JoinAck flooded with a TTL so peers the newcomer never
//!   contacted learn about it.
//! - **Heartbeats**: Each node bumps its own heartbeat once per round. Peers adopt a
//!   gossiped entry only when both its heartbeat and timestamp are newer.
//! - **Failure Detection**: An entry not updated for `timeout` ticks becomes
//!   *suspected* and a Fail notice is flooded. Suspected entries are removed after
//!   `t_cleanup` ticks, giving the notice time to spread.
//! - **Noise-Tolerant Wire Format**: Numeric fields travel in the high bits of
//!   64-bit words and every decoded snapshot entry is validated before use.

pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod table;
pub mod types;

mod detector;
mod gossip;
mod join;

pub use config::ProtocolConfig;
pub use engine::ProtocolEngine;
pub use error::{MembershipError, Result};
pub use protocol::{GossipMessage, MessageCodec, MessageKind};
pub use table::MembershipTable;
pub use types::{Endpoint, MembershipEntry, MembershipEvent, NodeState};
