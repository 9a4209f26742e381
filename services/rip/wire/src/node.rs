//! Identities of the nodes and ports taking part in the simulation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Route cost. Any value at or above the configured maximum hop count means
/// "unreachable".
pub type Cost = u32;

/// Opaque identity of a router or host.
///
/// Ordering carries no meaning beyond giving maps a stable iteration order.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create a node identity from its name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The name this node was created with
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for NodeId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Whether an endpoint runs routing logic.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Runs the distance-vector protocol and forwards traffic
    Router,
    /// Only sources and sinks data packets
    Host,
}

impl NodeKind {
    /// Check if this endpoint is a host
    pub fn is_host(&self) -> bool {
        matches!(self, NodeKind::Host)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Router => write!(f, "router"),
            NodeKind::Host => write!(f, "host"),
        }
    }
}

/// Local port identifier, assigned by the transport when a link is created.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortId(pub u32);

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port{}", self.0)
    }
}
