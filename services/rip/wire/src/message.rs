//! Message kinds exchanged between nodes.

use crate::node::{Cost, NodeId, NodeKind};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hop budget given to freshly sourced data packets
pub const DEFAULT_DATA_TTL: u8 = 64;

/// Everything a node can receive on one of its ports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    /// A link on the receiving port came up or went down
    Link(LinkEvent),
    /// A neighbor's advertised distance vector
    DistanceVector(DistanceVector),
    /// Application traffic to forward
    Data(DataPacket),
    /// Any kind this node does not understand
    #[serde(other)]
    Unknown,
}

impl Message {
    /// Check if this is routing-protocol control traffic
    pub fn is_control(&self) -> bool {
        matches!(self, Message::Link(_) | Message::DistanceVector(_))
    }

    /// Short name of the message kind, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Link(_) => "link",
            Message::DistanceVector(_) => "distance_vector",
            Message::Data(_) => "data",
            Message::Unknown => "unknown",
        }
    }
}

/// Notification that the link to `peer` changed state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEvent {
    /// Node on the other end of the link
    pub peer: NodeId,
    /// Whether the peer runs routing logic
    pub peer_kind: NodeKind,
    /// True on link establishment, false on teardown
    pub is_up: bool,
}

impl LinkEvent {
    /// Link establishment
    pub fn up(peer: NodeId, peer_kind: NodeKind) -> Self {
        Self {
            peer,
            peer_kind,
            is_up: true,
        }
    }

    /// Link teardown
    pub fn down(peer: NodeId, peer_kind: NodeKind) -> Self {
        Self {
            peer,
            peer_kind,
            is_up: false,
        }
    }
}

/// Distance vector advertised by `src` to one of its direct neighbors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceVector {
    /// Node that produced this vector
    pub src: NodeId,
    /// Advertised cost per destination
    pub entries: BTreeMap<NodeId, Cost>,
}

impl DistanceVector {
    /// Create an empty vector
    pub fn new(src: NodeId) -> Self {
        Self {
            src,
            entries: BTreeMap::new(),
        }
    }

    /// Builder-style insertion of one destination
    pub fn with_entry(mut self, dst: impl Into<NodeId>, cost: Cost) -> Self {
        self.entries.insert(dst.into(), cost);
        self
    }

    /// Advertised cost for a destination
    pub fn cost_of(&self, dst: &NodeId) -> Option<Cost> {
        self.entries.get(dst).copied()
    }

    /// Number of advertised destinations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is advertised
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Opaque application traffic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPacket {
    /// Originating endpoint
    pub src: NodeId,
    /// Final destination
    pub dst: NodeId,
    /// Remaining router hops before the packet is discarded
    pub ttl: u8,
    /// Payload, never interpreted by routers
    pub payload: Bytes,
}

impl DataPacket {
    /// Create a new data packet with the default TTL
    pub fn new(src: NodeId, dst: NodeId, payload: Bytes) -> Self {
        Self {
            src,
            dst,
            ttl: DEFAULT_DATA_TTL,
            payload,
        }
    }

    /// Check if the packet may not be forwarded any further
    pub fn is_ttl_expired(&self) -> bool {
        self.ttl == 0
    }

    /// Copy of this packet with one hop consumed, or `None` when exhausted
    pub fn decrement_ttl(&self) -> Option<Self> {
        if self.ttl > 0 {
            let mut pkt = self.clone();
            pkt.ttl -= 1;
            Some(pkt)
        } else {
            None
        }
    }
}
