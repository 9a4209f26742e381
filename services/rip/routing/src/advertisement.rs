//! Advertisements, route entries, and the advertisement observer hook

use rip_wire::{Cost, DistanceVector, NodeId};
use serde::{Deserialize, Serialize};

/// A distance vector addressed to one direct neighbor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Direct neighbor this vector is meant for
    pub neighbor: NodeId,
    /// Vector with poison reverse already applied for `neighbor`
    pub vector: DistanceVector,
}

impl Advertisement {
    /// Create a new advertisement
    pub fn new(neighbor: NodeId, vector: DistanceVector) -> Self {
        Self { neighbor, vector }
    }
}

/// One row of a node's best-route table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    /// Destination node
    pub destination: NodeId,
    /// Best known cost
    pub cost: Cost,
    /// Direct neighbor achieving `cost`
    pub next_hop: NodeId,
}

/// Receives a callback every time a table produces a round of advertisements.
///
/// Counting lives with whoever implements this (a test harness or the
/// simulator's statistics), never in process-wide state.
pub trait RouteObserver: Send + Sync {
    /// `owner` produced `count` advertisements in one round
    fn on_advertise(&self, owner: &NodeId, count: usize);
}
