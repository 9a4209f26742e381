//! Simulated network: every node runs as its own task.
//!
//! Each node owns one unbounded mailbox. A link is a pair of ports, one on
//! each end, and a frame sent on a port lands in the peer's mailbox tagged
//! with the peer's port. Since each sender writes to a peer through a single
//! channel, frames on a link arrive in the order they were sent.
//!
//! Every frame and every originated packet is counted while in flight, so
//! [`Network::settle`] can wait for the moment no work is left anywhere.

use crate::error::NetworkError;
use crate::graph::{RouteMismatch, Topology};
use crate::stats::NetworkStats;
use bytes::Bytes;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rip_routing::{RouteEntry, Router, RouterState, RouterStats, RoutingTable, TableConfig, Transport};
use rip_wire::{decode, encode, Cost, DataPacket, LinkEvent, Message, NodeId, NodeKind, PortId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default time allowed for the network to go quiet
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Network-wide settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Settings applied to every router's table
    pub table: TableConfig,
    /// Deadline for [`Network::settle`]
    pub settle_timeout: Duration,
    /// Seed for shuffling link bring-up order in [`Network::from_topology`]
    pub seed: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            table: TableConfig::default(),
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
            seed: None,
        }
    }
}

/// Point-in-time view of one node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// Node id
    pub node: NodeId,
    /// Router or host
    pub kind: NodeKind,
    /// Direct neighbors with an attached link
    pub neighbors: Vec<NodeId>,
    /// Best routes, empty for hosts
    pub routes: Vec<RouteEntry>,
    /// Router counters
    pub stats: Option<RouterStats>,
    /// Router protocol state
    pub state: Option<RouterState>,
}

impl NodeSnapshot {
    /// Best cost to `dst`
    pub fn cost_to(&self, dst: &NodeId) -> Option<Cost> {
        self.route_to(dst).map(|r| r.cost)
    }

    /// Next hop towards `dst`
    pub fn next_hop(&self, dst: &NodeId) -> Option<&NodeId> {
        self.route_to(dst).map(|r| &r.next_hop)
    }

    fn route_to(&self, dst: &NodeId) -> Option<&RouteEntry> {
        self.routes.iter().find(|r| r.destination == *dst)
    }
}

/// Count of frames and packets not yet fully processed
#[derive(Debug, Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    fn begin(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn end(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    fn pending(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Far end of an attached link
#[derive(Debug, Clone)]
struct Peer {
    node: NodeId,
    remote_port: PortId,
    mailbox: mpsc::UnboundedSender<NodeInput>,
}

/// Work items delivered to a node task
#[derive(Debug)]
enum NodeInput {
    Attach { port: PortId, peer: Peer },
    Detach { port: PortId },
    Frame { port: PortId, frame: Bytes },
    Originate { dst: NodeId, payload: Bytes },
    Snapshot(oneshot::Sender<NodeSnapshot>),
    Shutdown,
}

/// Outbound side of a node: encodes messages and hands frames to peers
#[derive(Debug)]
struct LinkTransport {
    owner: NodeId,
    peers: BTreeMap<PortId, Peer>,
    inflight: Arc<InFlight>,
    stats: Arc<NetworkStats>,
}

impl LinkTransport {
    fn new(owner: NodeId, inflight: Arc<InFlight>, stats: Arc<NetworkStats>) -> Self {
        Self {
            owner,
            peers: BTreeMap::new(),
            inflight,
            stats,
        }
    }

    fn attach(&mut self, port: PortId, peer: Peer) {
        debug!("{}: {} attached to {}", self.owner, port, peer.node);
        self.peers.insert(port, peer);
    }

    fn detach(&mut self, port: PortId) {
        if let Some(peer) = self.peers.remove(&port) {
            debug!("{}: {} detached from {}", self.owner, port, peer.node);
        }
    }

    fn neighbors(&self) -> Vec<NodeId> {
        self.peers.values().map(|p| p.node.clone()).collect()
    }

    fn transmit(&self, port: PortId, frame: Bytes) {
        let Some(peer) = self.peers.get(&port) else {
            debug!("{}: nothing attached to {}, frame dropped", self.owner, port);
            return;
        };
        self.inflight.begin();
        self.stats.record_frame();
        let input = NodeInput::Frame {
            port: peer.remote_port,
            frame,
        };
        if peer.mailbox.send(input).is_err() {
            debug!("{}: {} is no longer running, frame dropped", self.owner, peer.node);
            self.inflight.end();
        }
    }
}

impl Transport for LinkTransport {
    fn send(&mut self, port: PortId, message: Message) {
        match encode(&message) {
            Ok(frame) => self.transmit(port, frame),
            Err(e) => warn!("{}: failed to encode {}: {}", self.owner, message.kind(), e),
        }
    }
}

/// What runs inside a node task
#[derive(Debug)]
enum Role {
    Router(Router<LinkTransport>),
    Host(LinkTransport),
}

struct NodeTask {
    id: NodeId,
    role: Role,
    inflight: Arc<InFlight>,
    stats: Arc<NetworkStats>,
}

impl NodeTask {
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<NodeInput>) {
        while let Some(input) = inbox.recv().await {
            match input {
                NodeInput::Attach { port, peer } => self.link_mut().attach(port, peer),
                NodeInput::Detach { port } => self.link_mut().detach(port),
                NodeInput::Frame { port, frame } => {
                    self.on_frame(port, &frame);
                    self.inflight.end();
                }
                NodeInput::Originate { dst, payload } => {
                    self.originate(dst, payload);
                    self.inflight.end();
                }
                NodeInput::Snapshot(reply) => {
                    let _ = reply.send(self.snapshot());
                }
                NodeInput::Shutdown => break,
            }
        }
        debug!("{}: node task stopped", self.id);
    }

    fn link_mut(&mut self) -> &mut LinkTransport {
        match &mut self.role {
            Role::Router(router) => router.transport_mut(),
            Role::Host(link) => link,
        }
    }

    fn link(&self) -> &LinkTransport {
        match &self.role {
            Role::Router(router) => router.transport(),
            Role::Host(link) => link,
        }
    }

    fn on_frame(&mut self, port: PortId, frame: &[u8]) {
        let message = match decode(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!("{}: dropping undecodable frame on {}: {}", self.id, port, e);
                self.stats.record_malformed();
                return;
            }
        };

        match &mut self.role {
            Role::Router(router) => router.handle_receive(message, port),
            Role::Host(_) => match message {
                Message::Data(pkt) if pkt.dst == self.id => {
                    debug!("{}: received packet from {}", self.id, pkt.src);
                    self.stats.record_delivery(&self.id, pkt);
                }
                Message::Data(pkt) => {
                    debug!("{}: hosts do not forward, dropping packet for {}", self.id, pkt.dst)
                }
                Message::DistanceVector(dv) => {
                    warn!("{}: host received a distance vector from {}", self.id, dv.src);
                    self.stats.record_stray_control();
                }
                // Link transitions come from the network itself
                other => debug!("{}: ignoring {} on {}", self.id, other.kind(), port),
            },
        }
    }

    fn originate(&mut self, dst: NodeId, payload: Bytes) {
        let packet = DataPacket::new(self.id.clone(), dst, payload);
        let link = self.link_mut();
        let Some(&port) = link.peers.keys().next() else {
            warn!("{}: no link attached, dropping packet for {}", link.owner, packet.dst);
            return;
        };
        link.send(port, Message::Data(packet));
    }

    fn snapshot(&self) -> NodeSnapshot {
        let neighbors = self.link().neighbors();
        match &self.role {
            Role::Router(router) => NodeSnapshot {
                node: self.id.clone(),
                kind: NodeKind::Router,
                neighbors,
                routes: router.table().routes(),
                stats: Some(router.stats().clone()),
                state: Some(router.state()),
            },
            Role::Host(_) => NodeSnapshot {
                node: self.id.clone(),
                kind: NodeKind::Host,
                neighbors,
                routes: Vec::new(),
                stats: None,
                state: None,
            },
        }
    }
}

struct NodeHandle {
    kind: NodeKind,
    mailbox: mpsc::UnboundedSender<NodeInput>,
    next_port: u32,
    task: JoinHandle<()>,
}

/// A running simulated network
pub struct Network {
    config: NetworkConfig,
    nodes: BTreeMap<NodeId, NodeHandle>,
    /// `(smaller, larger)` -> ports on each end, same order
    links: BTreeMap<(NodeId, NodeId), (PortId, PortId)>,
    inflight: Arc<InFlight>,
    stats: Arc<NetworkStats>,
}

impl Network {
    /// Create an empty network. Must be called inside a tokio runtime.
    pub fn new(config: NetworkConfig) -> Result<Self, NetworkError> {
        config.table.validate()?;
        Ok(Self {
            config,
            nodes: BTreeMap::new(),
            links: BTreeMap::new(),
            inflight: Arc::new(InFlight::default()),
            stats: Arc::new(NetworkStats::new()),
        })
    }

    /// Spawn every node of `topology` and bring up its links.
    ///
    /// With a seed the links come up in a shuffled, reproducible order.
    pub fn from_topology(topology: &Topology, config: NetworkConfig) -> Result<Self, NetworkError> {
        let mut network = Self::new(config)?;
        for (id, kind) in topology.nodes() {
            network.add_node(id.clone(), kind)?;
        }

        let mut links = topology.links();
        if let Some(seed) = network.config.seed {
            let mut rng = StdRng::seed_from_u64(seed);
            links.shuffle(&mut rng);
        }
        for (a, b) in links {
            network.link(&a, &b)?;
        }

        info!(
            "Network started with {} nodes and {} links",
            network.nodes.len(),
            network.links.len()
        );
        Ok(network)
    }

    /// Spawn a router
    pub fn add_router(&mut self, name: impl Into<NodeId>) -> Result<(), NetworkError> {
        self.add_node(name.into(), NodeKind::Router)
    }

    /// Spawn a host
    pub fn add_host(&mut self, name: impl Into<NodeId>) -> Result<(), NetworkError> {
        self.add_node(name.into(), NodeKind::Host)
    }

    fn add_node(&mut self, id: NodeId, kind: NodeKind) -> Result<(), NetworkError> {
        if self.nodes.contains_key(&id) {
            return Err(NetworkError::DuplicateNode(id));
        }

        let link = LinkTransport::new(id.clone(), self.inflight.clone(), self.stats.clone());
        let role = match kind {
            NodeKind::Router => {
                let table = RoutingTable::new(id.clone(), self.config.table.clone())
                    .with_observer(self.stats.clone());
                Role::Router(Router::new(table, link))
            }
            NodeKind::Host => Role::Host(link),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let node = NodeTask {
            id: id.clone(),
            role,
            inflight: self.inflight.clone(),
            stats: self.stats.clone(),
        };
        let task = tokio::spawn(node.run(rx));

        debug!("Spawned {:?} {}", kind, id);
        self.nodes.insert(
            id,
            NodeHandle {
                kind,
                mailbox: tx,
                next_port: 0,
                task,
            },
        );
        Ok(())
    }

    fn link_key(a: &NodeId, b: &NodeId) -> (NodeId, NodeId) {
        if a <= b {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        }
    }

    fn handle(&self, node: &NodeId) -> Result<&NodeHandle, NetworkError> {
        self.nodes
            .get(node)
            .ok_or_else(|| NetworkError::UnknownNode(node.clone()))
    }

    fn deliver(&self, node: &NodeId, input: NodeInput) -> Result<(), NetworkError> {
        self.handle(node)?
            .mailbox
            .send(input)
            .map_err(|_| NetworkError::NodeStopped(node.clone()))
    }

    fn deliver_message(&self, node: &NodeId, port: PortId, message: &Message) -> Result<(), NetworkError> {
        let frame = encode(message)?;
        self.inflight.begin();
        let result = self.deliver(node, NodeInput::Frame { port, frame });
        if result.is_err() {
            self.inflight.end();
        }
        result
    }

    fn allocate_port(&mut self, node: &NodeId) -> Result<PortId, NetworkError> {
        let handle = self
            .nodes
            .get_mut(node)
            .ok_or_else(|| NetworkError::UnknownNode(node.clone()))?;
        let port = PortId(handle.next_port);
        handle.next_port += 1;
        Ok(port)
    }

    /// Bring up a link between `a` and `b`
    pub fn link(&mut self, a: &NodeId, b: &NodeId) -> Result<(), NetworkError> {
        let kind_a = self.handle(a)?.kind;
        let kind_b = self.handle(b)?.kind;
        if a == b {
            return Err(NetworkError::SelfLink(a.clone()));
        }
        let key = Self::link_key(a, b);
        if self.links.contains_key(&key) {
            return Err(NetworkError::AlreadyLinked(a.clone(), b.clone()));
        }

        let port_a = self.allocate_port(a)?;
        let port_b = self.allocate_port(b)?;
        let peer_of_a = Peer {
            node: b.clone(),
            remote_port: port_b,
            mailbox: self.handle(b)?.mailbox.clone(),
        };
        let peer_of_b = Peer {
            node: a.clone(),
            remote_port: port_a,
            mailbox: self.handle(a)?.mailbox.clone(),
        };

        // Attach both ends before either side learns the link is up.
        self.deliver(a, NodeInput::Attach { port: port_a, peer: peer_of_a })?;
        self.deliver(b, NodeInput::Attach { port: port_b, peer: peer_of_b })?;
        self.deliver_message(a, port_a, &Message::Link(LinkEvent::up(b.clone(), kind_b)))?;
        self.deliver_message(b, port_b, &Message::Link(LinkEvent::up(a.clone(), kind_a)))?;

        let ports = if *a == key.0 { (port_a, port_b) } else { (port_b, port_a) };
        self.links.insert(key, ports);
        info!("Link up: {} {} <-> {} {}", a, port_a, b, port_b);
        Ok(())
    }

    /// Take down the link between `a` and `b`
    pub fn unlink(&mut self, a: &NodeId, b: &NodeId) -> Result<(), NetworkError> {
        let kind_a = self.handle(a)?.kind;
        let kind_b = self.handle(b)?.kind;
        let key = Self::link_key(a, b);
        let Some((port_lo, port_hi)) = self.links.remove(&key) else {
            return Err(NetworkError::NotLinked(a.clone(), b.clone()));
        };
        let (port_a, port_b) = if *a == key.0 { (port_lo, port_hi) } else { (port_hi, port_lo) };

        self.deliver_message(a, port_a, &Message::Link(LinkEvent::down(b.clone(), kind_b)))?;
        self.deliver_message(b, port_b, &Message::Link(LinkEvent::down(a.clone(), kind_a)))?;
        self.deliver(a, NodeInput::Detach { port: port_a })?;
        self.deliver(b, NodeInput::Detach { port: port_b })?;

        info!("Link down: {} {} <-> {} {}", a, port_a, b, port_b);
        Ok(())
    }

    /// Have host `src` send a data packet to `dst` over its first link
    pub fn send_data(&self, src: &NodeId, dst: &NodeId, payload: impl Into<Bytes>) -> Result<(), NetworkError> {
        if !self.handle(src)?.kind.is_host() {
            return Err(NetworkError::NotAHost(src.clone()));
        }
        self.inflight.begin();
        let input = NodeInput::Originate {
            dst: dst.clone(),
            payload: payload.into(),
        };
        let result = self.deliver(src, input);
        if result.is_err() {
            self.inflight.end();
        }
        result
    }

    /// Deliver a raw frame to `node` as if it arrived on `port`
    pub fn inject_frame(&self, node: &NodeId, port: PortId, frame: Bytes) -> Result<(), NetworkError> {
        self.inflight.begin();
        let result = self.deliver(node, NodeInput::Frame { port, frame });
        if result.is_err() {
            self.inflight.end();
        }
        result
    }

    /// Wait until no frame or packet is in flight anywhere
    pub async fn settle(&self) -> Result<(), NetworkError> {
        let timeout = self.config.settle_timeout;
        tokio::time::timeout(timeout, self.inflight.wait_idle())
            .await
            .map_err(|_| {
                warn!(
                    "Network still busy after {:?} ({} in flight)",
                    timeout,
                    self.inflight.pending()
                );
                NetworkError::SettleTimeout(timeout)
            })
    }

    /// Current state of one node
    pub async fn snapshot(&self, node: &NodeId) -> Result<NodeSnapshot, NetworkError> {
        let (tx, rx) = oneshot::channel();
        self.deliver(node, NodeInput::Snapshot(tx))?;
        rx.await.map_err(|_| NetworkError::NodeStopped(node.clone()))
    }

    /// Current state of every node, in id order
    pub async fn snapshots(&self) -> Result<Vec<NodeSnapshot>, NetworkError> {
        let mut snapshots = Vec::with_capacity(self.nodes.len());
        for node in self.nodes.keys() {
            snapshots.push(self.snapshot(node).await?);
        }
        Ok(snapshots)
    }

    /// Compare every router's table against `topology`'s shortest paths
    pub async fn check_against(&self, topology: &Topology) -> Result<Vec<RouteMismatch>, NetworkError> {
        let mut mismatches = Vec::new();
        for snapshot in self.snapshots().await? {
            if snapshot.kind.is_host() {
                continue;
            }
            mismatches.extend(topology.check_routes(&snapshot.node, &snapshot.routes, &self.config.table));
        }
        Ok(mismatches)
    }

    /// Check if `a` and `b` are linked
    pub fn is_linked(&self, a: &NodeId, b: &NodeId) -> bool {
        self.links.contains_key(&Self::link_key(a, b))
    }

    /// Node ids with their kinds
    pub fn nodes(&self) -> impl Iterator<Item = (&NodeId, NodeKind)> {
        self.nodes.iter().map(|(id, handle)| (id, handle.kind))
    }

    /// Data packets that reached `host`, in arrival order
    pub fn delivered(&self, host: &NodeId) -> Vec<DataPacket> {
        self.stats.delivered_to(host)
    }

    /// Network-wide counters
    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    /// Settings in use
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Stop every node task and wait for it to exit
    pub async fn shutdown(self) {
        for handle in self.nodes.values() {
            let _ = handle.mailbox.send(NodeInput::Shutdown);
        }
        for (id, handle) in self.nodes {
            if let Err(e) = handle.task.await {
                warn!("Node {} task failed: {}", id, e);
            }
        }
        info!("Network shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_inflight_wait_idle() {
        let inflight = Arc::new(InFlight::default());
        inflight.wait_idle().await;

        inflight.begin();
        inflight.begin();
        let waiter = {
            let inflight = inflight.clone();
            tokio::spawn(async move { inflight.wait_idle().await })
        };
        inflight.end();
        assert!(!waiter.is_finished());
        inflight.end();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = NetworkConfig {
            table: TableConfig {
                max_hop_count: 1,
                ..TableConfig::default()
            },
            ..NetworkConfig::default()
        };
        assert!(matches!(Network::new(config), Err(NetworkError::Config(_))));
    }

    #[test]
    fn test_snapshot_lookup() {
        let snapshot = NodeSnapshot {
            node: "s1".into(),
            kind: NodeKind::Router,
            neighbors: vec!["s2".into()],
            routes: vec![RouteEntry {
                destination: "h2".into(),
                cost: 2,
                next_hop: "s2".into(),
            }],
            stats: None,
            state: Some(RouterState::Converged),
        };
        assert_eq!(snapshot.cost_to(&"h2".into()), Some(2));
        assert_eq!(snapshot.next_hop(&"h2".into()), Some(&NodeId::from("s2")));
        assert_eq!(snapshot.cost_to(&"h9".into()), None);
    }
}
