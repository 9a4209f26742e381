//! Routing error types.

use rip_wire::NodeId;
use thiserror::Error;

/// Routing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// No neighbor vector covers the destination
    #[error("destination {0} unreachable")]
    Unreachable(NodeId),

    /// Table configuration rejected
    #[error("invalid routing config: {0}")]
    InvalidConfig(String),
}
