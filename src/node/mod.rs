//! Node Runtime Module
//!
//! Runs a single protocol engine as a network process.
//!
//! ## Core Mechanisms
//! - **UDP Transport**: Endpoint `(id, port)` is reached at `host:(base_port + id)`.
//!   A receive task forwards every datagram to the tick loop over a channel.
//! - **Tick Loop**: A wall-clock interval drives the engine's logical clock. Each
//!   tick drains received payloads, runs one protocol round and publishes a
//!   [`NodeSnapshot`] on a watch channel.
//! - **Status API**: An optional axum server exposes the latest snapshot under
//!   `/status`, `/members` and `/members/:id`.

pub mod handlers;
pub mod service;
pub mod types;

pub use service::NodeService;
pub use types::{MemberView, NodeOptions, NodeSnapshot};

#[cfg(test)]
mod tests;
