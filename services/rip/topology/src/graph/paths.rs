//! Shortest-path oracle used to check converged routing tables.

use super::Topology;
use rip_routing::{RouteEntry, TableConfig};
use rip_wire::{Cost, NodeId};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};
use std::fmt;

/// A route that disagrees with the true shortest path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMismatch {
    /// Router whose table is wrong
    pub node: NodeId,
    /// Destination concerned
    pub destination: NodeId,
    /// Shortest distance, `None` if unreachable
    pub expected: Option<Cost>,
    /// Cost in the table, `None` if absent
    pub actual: Option<Cost>,
    /// Next hop in the table
    pub next_hop: Option<NodeId>,
}

impl fmt::Display for RouteMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |cost: Option<Cost>| match cost {
            Some(c) => c.to_string(),
            None => "unreachable".to_string(),
        };
        if self.expected == self.actual {
            write!(
                f,
                "{} -> {}: next hop {} is not on a shortest path",
                self.node,
                self.destination,
                self.next_hop.as_ref().map(|n| n.as_str()).unwrap_or("-")
            )
        } else {
            write!(
                f,
                "{} -> {}: expected {}, got {}",
                self.node,
                self.destination,
                show(self.expected),
                show(self.actual)
            )
        }
    }
}

impl Topology {
    /// Shortest distance from `from` to every destination the protocol can reach.
    ///
    /// Hosts end paths, they are never transit nodes. Distances at or above
    /// the hop limit are left out, like the routing table would.
    pub fn shortest_paths(&self, from: &NodeId, config: &TableConfig) -> BTreeMap<NodeId, Cost> {
        let mut distances: BTreeMap<NodeId, Cost> = BTreeMap::new();
        let mut unvisited: BinaryHeap<Reverse<(Cost, NodeId)>> = BinaryHeap::new();

        distances.insert(from.clone(), 0);
        unvisited.push(Reverse((0, from.clone())));

        while let Some(Reverse((current_dist, current_node))) = unvisited.pop() {
            // Skip if we've already found a better path
            if current_dist > distances.get(&current_node).copied().unwrap_or(Cost::MAX) {
                continue;
            }
            if current_node != *from && self.kind(&current_node).is_some_and(|k| k.is_host()) {
                continue;
            }

            for neighbor in self.neighbors(&current_node) {
                let new_dist = current_dist.saturating_add(config.link_cost);
                let existing_dist = distances.get(neighbor).copied().unwrap_or(Cost::MAX);

                if new_dist < existing_dist {
                    distances.insert(neighbor.clone(), new_dist);
                    unvisited.push(Reverse((new_dist, neighbor.clone())));
                }
            }
        }

        distances.remove(from);
        distances.retain(|_, cost| !config.is_unreachable(*cost));
        distances
    }

    /// Compare a router's table against the oracle.
    ///
    /// Every cost must equal the shortest distance and every next hop must
    /// be a direct neighbor that lies on some shortest path.
    pub fn check_routes(
        &self,
        node: &NodeId,
        routes: &[RouteEntry],
        config: &TableConfig,
    ) -> Vec<RouteMismatch> {
        let expected = self.shortest_paths(node, config);
        let actual: BTreeMap<&NodeId, &RouteEntry> =
            routes.iter().map(|r| (&r.destination, r)).collect();

        let destinations: BTreeSet<&NodeId> =
            expected.keys().chain(actual.keys().copied()).collect();

        let mut mismatches = Vec::new();
        for dst in destinations {
            let want = expected.get(dst).copied();
            let entry = actual.get(dst).copied();
            let got = entry.map(|r| r.cost);

            let next_hop_ok = match entry {
                Some(route) if want == got => self.is_shortest_next_hop(node, route, config),
                _ => want == got,
            };

            if !next_hop_ok {
                mismatches.push(RouteMismatch {
                    node: node.clone(),
                    destination: dst.clone(),
                    expected: want,
                    actual: got,
                    next_hop: entry.map(|r| r.next_hop.clone()),
                });
            }
        }
        mismatches
    }

    fn is_shortest_next_hop(&self, node: &NodeId, route: &RouteEntry, config: &TableConfig) -> bool {
        if !self.is_linked(node, &route.next_hop) {
            return false;
        }
        if route.next_hop == route.destination {
            return route.cost == config.link_cost;
        }
        if self.kind(&route.next_hop).map_or(true, |k| k.is_host()) {
            return false;
        }
        self.shortest_paths(&route.next_hop, config)
            .get(&route.destination)
            .is_some_and(|&rest| rest.saturating_add(config.link_cost) == route.cost)
    }
}
