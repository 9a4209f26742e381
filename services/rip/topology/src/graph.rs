//! Static description of which nodes exist and how they are wired.

use crate::error::NetworkError;
use rip_wire::{NodeId, NodeKind};
use std::collections::{BTreeMap, BTreeSet};

/// Named nodes with kinds and undirected links
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    /// Every node and whether it routes
    nodes: BTreeMap<NodeId, NodeKind>,
    /// Direct neighbors of each node
    adjacency: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

// Shortest-path oracle and route checking
mod paths;
pub use paths::RouteMismatch;

impl Topology {
    /// Create an empty topology
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node that runs the routing protocol
    pub fn add_router(&mut self, name: impl Into<NodeId>) -> Result<(), NetworkError> {
        self.add_node(name.into(), NodeKind::Router)
    }

    /// Add an endpoint that only sources and sinks data
    pub fn add_host(&mut self, name: impl Into<NodeId>) -> Result<(), NetworkError> {
        self.add_node(name.into(), NodeKind::Host)
    }

    fn add_node(&mut self, id: NodeId, kind: NodeKind) -> Result<(), NetworkError> {
        if self.nodes.contains_key(&id) {
            return Err(NetworkError::DuplicateNode(id));
        }
        self.adjacency.insert(id.clone(), BTreeSet::new());
        self.nodes.insert(id, kind);
        Ok(())
    }

    /// Connect two existing nodes
    pub fn add_link(&mut self, a: impl Into<NodeId>, b: impl Into<NodeId>) -> Result<(), NetworkError> {
        let (a, b) = (a.into(), b.into());
        self.check_pair(&a, &b)?;
        if self.is_linked(&a, &b) {
            return Err(NetworkError::AlreadyLinked(a, b));
        }
        self.adjacency.entry(a.clone()).or_default().insert(b.clone());
        self.adjacency.entry(b).or_default().insert(a);
        Ok(())
    }

    /// Disconnect two linked nodes
    pub fn remove_link(&mut self, a: &NodeId, b: &NodeId) -> Result<(), NetworkError> {
        self.check_pair(a, b)?;
        if !self.is_linked(a, b) {
            return Err(NetworkError::NotLinked(a.clone(), b.clone()));
        }
        if let Some(set) = self.adjacency.get_mut(a) {
            set.remove(b);
        }
        if let Some(set) = self.adjacency.get_mut(b) {
            set.remove(a);
        }
        Ok(())
    }

    fn check_pair(&self, a: &NodeId, b: &NodeId) -> Result<(), NetworkError> {
        for node in [a, b] {
            if !self.nodes.contains_key(node) {
                return Err(NetworkError::UnknownNode(node.clone()));
            }
        }
        if a == b {
            return Err(NetworkError::SelfLink(a.clone()));
        }
        Ok(())
    }

    /// Kind of a node, if it exists
    pub fn kind(&self, node: &NodeId) -> Option<NodeKind> {
        self.nodes.get(node).copied()
    }

    /// Check if two nodes share a direct link
    pub fn is_linked(&self, a: &NodeId, b: &NodeId) -> bool {
        self.adjacency.get(a).is_some_and(|set| set.contains(b))
    }

    /// Direct neighbors of `node`, in id order
    pub fn neighbors(&self, node: &NodeId) -> impl Iterator<Item = &NodeId> {
        self.adjacency.get(node).into_iter().flatten()
    }

    /// All nodes with their kinds, in id order
    pub fn nodes(&self) -> impl Iterator<Item = (&NodeId, NodeKind)> {
        self.nodes.iter().map(|(id, kind)| (id, *kind))
    }

    /// All routers, in id order
    pub fn routers(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes
            .iter()
            .filter(|(_, kind)| !kind.is_host())
            .map(|(id, _)| id)
    }

    /// All hosts, in id order
    pub fn hosts(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes
            .iter()
            .filter(|(_, kind)| kind.is_host())
            .map(|(id, _)| id)
    }

    /// Every link once, as `(smaller, larger)` pairs in order
    pub fn links(&self) -> Vec<(NodeId, NodeId)> {
        self.adjacency
            .iter()
            .flat_map(|(a, set)| {
                set.iter()
                    .filter(move |b| a < *b)
                    .map(move |b| (a.clone(), b.clone()))
            })
            .collect()
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the topology has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
