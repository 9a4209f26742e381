//! Simulator error types.

use rip_routing::RouteError;
use rip_wire::{NodeId, WireError};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while building or driving a simulated network
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Node name not registered
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// Node name registered twice
    #[error("node {0} already exists")]
    DuplicateNode(NodeId),

    /// Link from a node to itself
    #[error("not valid to link {0} to itself")]
    SelfLink(NodeId),

    /// Link already present
    #[error("{0} and {1} are already linked")]
    AlreadyLinked(NodeId, NodeId),

    /// Link not present
    #[error("{0} and {1} are not linked")]
    NotLinked(NodeId, NodeId),

    /// Only hosts source data packets
    #[error("{0} is not a host")]
    NotAHost(NodeId),

    /// Frames still in flight when the deadline passed
    #[error("network did not settle within {0:?}")]
    SettleTimeout(Duration),

    /// The node's task has exited
    #[error("node {0} is no longer running")]
    NodeStopped(NodeId),

    /// Routing configuration rejected
    #[error("invalid routing configuration: {0}")]
    Config(#[from] RouteError),

    /// Frame could not be built
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
}
