//! Topologies, scenarios, shortest-path oracle, and the simulated network.
//!
//! This crate is the collaborator the routing core runs inside: it describes
//! which nodes exist and how they are wired, runs every node as its own task
//! with per-link FIFO delivery, and knows the true shortest distances so a
//! converged network can be checked against them.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod graph;
pub mod network;
pub mod scenario;
pub mod stats;

pub use error::NetworkError;
pub use graph::{RouteMismatch, Topology};
pub use network::{Network, NetworkConfig, NodeSnapshot};
pub use scenario::Scenario;
pub use stats::NetworkStats;
