//! Gossip Membership Library
//!
//! A decentralized group membership and failure detection protocol. Every node
//! keeps a bounded table of peers, learns about newcomers through an introducer
//! and a TTL-bounded flood, exchanges heartbeats through full-table gossip, and
//! removes peers that stop responding.
//!
//! ## Architecture Modules
//! - **`membership`**: The protocol itself. Table, wire codec, join handshake,
//!   gossip merge and failure detector, all driven by one `tick` per round.
//! - **`transport`**: The seams the engine talks through (`Transport`, `Clock`),
//!   with an in-memory network for simulation and a UDP transport for processes.
//! - **`simulation`**: Runs a whole group in one process with staggered joins,
//!   injected crashes and message loss, and reports the outcome.
//! - **`node`**: Runs a single engine over UDP with an optional HTTP status API.

pub mod membership;
pub mod node;
pub mod simulation;
pub mod transport;
