//! Simulation Module
//!
//! Runs a complete group of protocol engines in one process over an in-memory
//! network, driven by a single logical clock.
//!
//! ## Core Mechanisms
//! - **Staggered Joins**: Node `i` is started at tick `i * join_interval`; the
//!   introducer `(1,0)` starts the group at tick 0.
//! - **Crash Injection**: At `crash_at`, a seeded random pick of non-introducer
//!   nodes crashes and their queued traffic is discarded.
//! - **Lossy Delivery**: Each message is dropped with `drop_probability`.
//! - **Reporting**: The final tables, the event log and message counters are
//!   collected into a serializable [`SimulationReport`].

pub mod driver;
pub mod types;

pub use driver::Simulation;
pub use types::{NodeReport, SimulationConfig, SimulationReport};
