//! Distance-vector routing table with poison reverse

use crate::advertisement::{Advertisement, RouteEntry, RouteObserver};
use crate::config::{MetricMode, TableConfig};
use crate::error::RouteError;
use rip_wire::{Cost, DistanceVector, NodeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-node routing state.
///
/// `costs[n][d]` is this node's total cost to `d` through direct neighbor
/// `n`; `costs[n][n]` is always the direct link cost. `best_costs` and
/// `best_ports` are derived from `costs` by [`RoutingTable::recompute_best`]
/// and nothing else writes them. A destination missing from `best_costs` is
/// unreachable.
pub struct RoutingTable {
    /// Node this table belongs to
    owner: NodeId,
    /// Tunables
    config: TableConfig,
    /// Neighbor vectors: neighbor -> destination -> cost via that neighbor
    costs: BTreeMap<NodeId, BTreeMap<NodeId, Cost>>,
    /// Minimum cost per destination
    best_costs: BTreeMap<NodeId, Cost>,
    /// Neighbor achieving the minimum per destination
    best_ports: BTreeMap<NodeId, NodeId>,
    /// Notified once per advertisement round
    observer: Option<Arc<dyn RouteObserver>>,
}

impl RoutingTable {
    /// Create an empty table for `owner`
    pub fn new(owner: NodeId, config: TableConfig) -> Self {
        Self {
            owner,
            config,
            costs: BTreeMap::new(),
            best_costs: BTreeMap::new(),
            best_ports: BTreeMap::new(),
            observer: None,
        }
    }

    /// Attach an observer that is told about every advertisement round
    pub fn with_observer(mut self, observer: Arc<dyn RouteObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Register `neighbor` as a direct link.
    ///
    /// Calling this again for an up neighbor only re-affirms the direct cost.
    /// Returns whether the best-route set changed.
    pub fn link_up(&mut self, neighbor: NodeId) -> bool {
        if neighbor == self.owner {
            warn!("Ignoring link to self on {}", self.owner);
            return false;
        }

        let link_cost = self.config.link_cost;
        let vector = self.costs.entry(neighbor.clone()).or_default();
        vector.insert(neighbor.clone(), link_cost);

        info!("{}: link up to {} (cost: {})", self.owner, neighbor, link_cost);
        self.recompute_best()
    }

    /// Forget direct neighbor `neighbor` and everything learned through it.
    ///
    /// Returns whether the best-route set changed.
    pub fn link_down(&mut self, neighbor: &NodeId) -> bool {
        match self.costs.remove(neighbor) {
            Some(vector) => {
                info!(
                    "{}: link down to {} ({} routes via it withdrawn)",
                    self.owner,
                    neighbor,
                    vector.len()
                );
                self.recompute_best()
            }
            None => {
                debug!("{}: link down for unknown neighbor {}", self.owner, neighbor);
                false
            }
        }
    }

    /// Drop every learned route and keep only the direct links.
    ///
    /// Returns whether the best-route set changed.
    pub fn reset_learned(&mut self) -> bool {
        for (neighbor, vector) in self.costs.iter_mut() {
            vector.retain(|dst, _| dst == neighbor);
        }
        info!(
            "{}: reset learned routes, {} direct links kept",
            self.owner,
            self.costs.len()
        );
        self.recompute_best()
    }

    /// Process a distance vector advertised by `msg.src`.
    ///
    /// Returns the advertisements to send when the best-route set changed,
    /// and nothing otherwise.
    pub fn receive_update(&mut self, msg: DistanceVector) -> Vec<Advertisement> {
        let src = msg.src;
        let Some(previous) = self.costs.get(&src) else {
            debug!(
                "{}: ignoring distance vector from {} (not a direct neighbor)",
                self.owner, src
            );
            return Vec::new();
        };
        let previous_len = previous.len();

        let link_cost = self.config.link_cost;
        let base = match self.config.metric {
            MetricMode::Weighted => {
                self.best_costs.get(&src).copied().unwrap_or(link_cost)
            }
            MetricMode::HopCount => link_cost,
        };

        let mut learned = BTreeMap::new();
        learned.insert(src.clone(), link_cost);

        for (dst, advertised) in msg.entries {
            if self.config.is_unreachable(advertised) || dst == src {
                continue;
            }
            if dst == self.owner {
                continue;
            }
            let cost = base.saturating_add(advertised);
            if self.config.is_unreachable(cost) {
                continue;
            }
            learned.insert(dst, cost);
        }

        debug!(
            "{}: vector from {} now covers {} destinations (was {})",
            self.owner,
            src,
            learned.len(),
            previous_len
        );

        // Anything missing from `learned` is implicitly withdrawn.
        self.costs.insert(src, learned);

        if self.recompute_best() {
            self.advertise_all()
        } else {
            Vec::new()
        }
    }

    /// Rebuild `best_costs`/`best_ports` from the neighbor vectors.
    ///
    /// Neighbors are visited in ascending order and only a strictly lower
    /// cost replaces the current candidate, so ties go to the smallest
    /// neighbor id. Returns whether anything changed.
    pub fn recompute_best(&mut self) -> bool {
        let mut best_costs: BTreeMap<NodeId, Cost> = BTreeMap::new();
        let mut best_ports: BTreeMap<NodeId, NodeId> = BTreeMap::new();

        for (neighbor, vector) in &self.costs {
            for (dst, &cost) in vector {
                if *dst == self.owner || self.config.is_unreachable(cost) {
                    continue;
                }
                let better = best_costs.get(dst).map_or(true, |&current| cost < current);
                if better {
                    best_costs.insert(dst.clone(), cost);
                    best_ports.insert(dst.clone(), neighbor.clone());
                }
            }
        }

        let changed = best_costs != self.best_costs || best_ports != self.best_ports;
        if changed {
            debug!(
                "{}: best routes changed ({} -> {} destinations)",
                self.owner,
                self.best_costs.len(),
                best_costs.len()
            );
        }

        self.best_costs = best_costs;
        self.best_ports = best_ports;
        changed
    }

    /// Next hop towards `dest`
    pub fn forwarding_next_hop(&self, dest: &NodeId) -> Result<NodeId, RouteError> {
        self.best_ports
            .get(dest)
            .cloned()
            .ok_or_else(|| RouteError::Unreachable(dest.clone()))
    }

    /// Build one vector per direct neighbor, poisoning routes that go through it
    pub fn advertise_all(&self) -> Vec<Advertisement> {
        let infinity = self.config.infinity();

        let adverts: Vec<Advertisement> = self
            .costs
            .keys()
            .map(|neighbor| {
                let mut vector = DistanceVector::new(self.owner.clone());
                for (dst, &cost) in &self.best_costs {
                    if dst == neighbor || *dst == self.owner {
                        continue;
                    }
                    let advertised = if self.best_ports.get(dst) == Some(neighbor) {
                        infinity
                    } else {
                        cost
                    };
                    vector.entries.insert(dst.clone(), advertised);
                }
                Advertisement::new(neighbor.clone(), vector)
            })
            .collect();

        if let Some(observer) = &self.observer {
            observer.on_advertise(&self.owner, adverts.len());
        }

        adverts
    }

    /// Node this table belongs to
    pub fn owner(&self) -> &NodeId {
        &self.owner
    }

    /// Table configuration
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Best known cost to `dest`
    pub fn best_cost(&self, dest: &NodeId) -> Option<Cost> {
        self.best_costs.get(dest).copied()
    }

    /// Neighbor achieving the best cost to `dest`
    pub fn best_next_hop(&self, dest: &NodeId) -> Option<&NodeId> {
        self.best_ports.get(dest)
    }

    /// Current direct neighbors, in id order
    pub fn neighbors(&self) -> impl Iterator<Item = &NodeId> {
        self.costs.keys()
    }

    /// Check if `node` is an up direct neighbor
    pub fn is_neighbor(&self, node: &NodeId) -> bool {
        self.costs.contains_key(node)
    }

    /// This node's costs via `neighbor`
    pub fn neighbor_vector(&self, neighbor: &NodeId) -> Option<&BTreeMap<NodeId, Cost>> {
        self.costs.get(neighbor)
    }

    /// Ordered copy of the best-route table
    pub fn routes(&self) -> Vec<RouteEntry> {
        self.best_costs
            .iter()
            .filter_map(|(dst, &cost)| {
                self.best_ports.get(dst).map(|next_hop| RouteEntry {
                    destination: dst.clone(),
                    cost,
                    next_hop: next_hop.clone(),
                })
            })
            .collect()
    }

    /// Number of reachable destinations
    pub fn len(&self) -> usize {
        self.best_costs.len()
    }

    /// Check if no destination is reachable
    pub fn is_empty(&self) -> bool {
        self.best_costs.is_empty()
    }
}

impl fmt::Debug for RoutingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingTable")
            .field("owner", &self.owner)
            .field("costs", &self.costs)
            .field("best_costs", &self.best_costs)
            .field("best_ports", &self.best_ports)
            .finish_non_exhaustive()
    }
}
