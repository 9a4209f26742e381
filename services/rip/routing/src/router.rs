//! Message dispatch between the transport and the routing table

use crate::advertisement::Advertisement;
use crate::config::LinkDownPolicy;
use crate::table::RoutingTable;
use rip_wire::{DataPacket, DistanceVector, LinkEvent, Message, NodeId, NodeKind, PortId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use tracing::{debug, info, warn};

/// Reason for dropping an inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DropReason {
    /// No route to destination
    NoRoute,
    /// TTL expired
    TtlExpired,
    /// Next hop has no bound port
    NoPort,
    /// Message kind not understood
    UnknownMessage,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::NoRoute => write!(f, "no route to destination"),
            DropReason::TtlExpired => write!(f, "TTL expired"),
            DropReason::NoPort => write!(f, "no port bound to next hop"),
            DropReason::UnknownMessage => write!(f, "unknown message kind"),
        }
    }
}

/// Observable protocol state of one node.
///
/// Derived for tests and logs; the router does not branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouterState {
    /// No link is up
    NoLinks,
    /// The last routing event changed the best-route set
    Learning,
    /// The last routing event changed nothing
    Converged,
}

/// Hands messages to the surrounding network. Fire-and-forget.
pub trait Transport {
    /// Transmit `message` on local `port`
    fn send(&mut self, port: PortId, message: Message);
}

/// Router statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterStats {
    /// Distance vectors received
    pub updates_received: u64,
    /// Distance vectors handed to the transport
    pub advertisements_sent: u64,
    /// Control messages not sent because the peer is a host
    pub control_suppressed: u64,
    /// Data packets forwarded to a next hop
    pub packets_forwarded: u64,
    /// Data packets addressed to this router
    pub packets_local: u64,
    /// Messages dropped
    pub packets_dropped: u64,
    /// Breakdown of drop reasons
    pub drop_reasons: HashMap<String, u64>,
}

impl RouterStats {
    fn record_drop(&mut self, reason: DropReason) {
        self.packets_dropped += 1;
        *self.drop_reasons.entry(reason.to_string()).or_insert(0) += 1;
    }

    /// Number of drops for one reason
    pub fn drops(&self, reason: DropReason) -> u64 {
        self.drop_reasons.get(&reason.to_string()).copied().unwrap_or(0)
    }
}

/// Routes inbound events to the [`RoutingTable`] and governs forwarding
#[derive(Debug)]
pub struct Router<T: Transport> {
    /// Routing state for this node
    table: RoutingTable,
    /// Direct neighbor -> local port
    ports: BTreeMap<NodeId, PortId>,
    /// Direct neighbors that never run routing logic
    hosts: BTreeSet<NodeId>,
    /// Outbound side
    transport: T,
    /// Counters
    stats: RouterStats,
    /// Whether the last routing event changed the best-route set
    last_changed: bool,
}

impl<T: Transport> Router<T> {
    /// Create a router around `table` sending through `transport`
    pub fn new(table: RoutingTable, transport: T) -> Self {
        Self {
            table,
            ports: BTreeMap::new(),
            hosts: BTreeSet::new(),
            transport,
            stats: RouterStats::default(),
            last_changed: false,
        }
    }

    /// Dispatch one inbound message received on `port`
    pub fn handle_receive(&mut self, message: Message, port: PortId) {
        match message {
            Message::Link(ev) => self.on_link_event(ev, port),
            Message::DistanceVector(msg) => self.on_distance_vector(msg),
            Message::Data(pkt) => self.on_data_packet(pkt),
            Message::Unknown => {
                warn!("{}: dropping message of unknown kind on {}", self.owner(), port);
                self.stats.record_drop(DropReason::UnknownMessage);
            }
        }
    }

    /// A link on `port` came up or went down
    pub fn on_link_event(&mut self, ev: LinkEvent, port: PortId) {
        if ev.peer == *self.owner() {
            warn!("{}: ignoring link event for itself on {}", self.owner(), port);
            return;
        }

        if ev.is_up {
            self.ports.insert(ev.peer.clone(), port);
            if ev.peer_kind.is_host() {
                self.hosts.insert(ev.peer.clone());
            } else {
                self.hosts.remove(&ev.peer);
            }
            self.last_changed = self.table.link_up(ev.peer);
        } else {
            match self.ports.remove(&ev.peer) {
                Some(bound) if bound != port => debug!(
                    "{}: {} went down on {} but was bound to {}",
                    self.owner(),
                    ev.peer,
                    port,
                    bound
                ),
                _ => {}
            }
            let was_host = self.hosts.remove(&ev.peer) || ev.peer_kind == NodeKind::Host;

            let mut changed = self.table.link_down(&ev.peer);
            if !was_host && self.table.config().link_down_policy == LinkDownPolicy::FullReset {
                changed |= self.table.reset_learned();
            }
            self.last_changed = changed;
        }

        // A link transition is always worth sharing, changed or not.
        let adverts = self.table.advertise_all();
        self.send_advertisements(adverts);
    }

    /// A neighbor's distance vector arrived
    pub fn on_distance_vector(&mut self, msg: DistanceVector) {
        self.stats.updates_received += 1;
        let adverts = self.table.receive_update(msg);
        self.last_changed = !adverts.is_empty();
        self.send_advertisements(adverts);
    }

    /// Application traffic arrived
    pub fn on_data_packet(&mut self, pkt: DataPacket) {
        if pkt.dst == *self.owner() {
            debug!("{}: packet from {} delivered locally", self.owner(), pkt.src);
            self.stats.packets_local += 1;
            return;
        }

        let Some(pkt) = pkt.decrement_ttl() else {
            debug!(
                "{}: dropping packet from {} to {}: {}",
                self.owner(),
                pkt.src,
                pkt.dst,
                DropReason::TtlExpired
            );
            self.stats.record_drop(DropReason::TtlExpired);
            return;
        };

        match self.table.forwarding_next_hop(&pkt.dst) {
            Ok(next_hop) => {
                debug!("{}: forwarding packet for {} via {}", self.owner(), pkt.dst, next_hop);
                if self.send(Message::Data(pkt), &next_hop) {
                    self.stats.packets_forwarded += 1;
                } else {
                    self.stats.record_drop(DropReason::NoPort);
                }
            }
            Err(e) => {
                debug!("{}: dropping packet from {}: {}", self.owner(), pkt.src, e);
                self.stats.record_drop(DropReason::NoRoute);
            }
        }
    }

    /// Send `message` to direct neighbor `destination`.
    ///
    /// Control traffic is never sent to a host. Returns whether the message
    /// reached the transport.
    pub fn send(&mut self, message: Message, destination: &NodeId) -> bool {
        if message.is_control() && self.hosts.contains(destination) {
            debug!(
                "{}: suppressing {} to host {}",
                self.owner(),
                message.kind(),
                destination
            );
            self.stats.control_suppressed += 1;
            return false;
        }

        match self.ports.get(destination) {
            Some(&port) => {
                self.transport.send(port, message);
                true
            }
            None => {
                debug!(
                    "{}: no port bound for {}, dropping {}",
                    self.owner(),
                    destination,
                    message.kind()
                );
                false
            }
        }
    }

    fn send_advertisements(&mut self, adverts: Vec<Advertisement>) {
        let mut sent = 0;
        for advert in adverts {
            if self.send(Message::DistanceVector(advert.vector), &advert.neighbor) {
                sent += 1;
            }
        }
        if sent > 0 {
            info!("{}: sent {} distance vectors", self.owner(), sent);
        }
        self.stats.advertisements_sent += sent;
    }

    /// Node this router runs on
    pub fn owner(&self) -> &NodeId {
        self.table.owner()
    }

    /// Routing state
    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    /// Counters
    pub fn stats(&self) -> &RouterStats {
        &self.stats
    }

    /// Local port bound to direct neighbor `peer`
    pub fn port_of(&self, peer: &NodeId) -> Option<PortId> {
        self.ports.get(peer).copied()
    }

    /// Outbound side
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Outbound side, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Observable protocol state
    pub fn state(&self) -> RouterState {
        if self.ports.is_empty() {
            RouterState::NoLinks
        } else if self.last_changed {
            RouterState::Learning
        } else {
            RouterState::Converged
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableConfig;
    use bytes::Bytes;

    #[derive(Debug, Default)]
    struct RecordingTransport {
        sent: Vec<(PortId, Message)>,
    }

    impl Transport for RecordingTransport {
        fn send(&mut self, port: PortId, message: Message) {
            self.sent.push((port, message));
        }
    }

    impl RecordingTransport {
        fn vectors_on(&self, port: PortId) -> Vec<&DistanceVector> {
            self.sent
                .iter()
                .filter_map(|(p, m)| match m {
                    Message::DistanceVector(dv) if *p == port => Some(dv),
                    _ => None,
                })
                .collect()
        }
    }

    fn id(name: &str) -> NodeId {
        NodeId::from(name)
    }

    fn router(name: &str) -> Router<RecordingTransport> {
        router_with(name, TableConfig::default())
    }

    fn router_with(name: &str, config: TableConfig) -> Router<RecordingTransport> {
        Router::new(RoutingTable::new(id(name), config), RecordingTransport::default())
    }

    fn up(peer: &str, kind: NodeKind) -> Message {
        Message::Link(LinkEvent::up(id(peer), kind))
    }

    fn down(peer: &str, kind: NodeKind) -> Message {
        Message::Link(LinkEvent::down(id(peer), kind))
    }

    #[test]
    fn test_drop_reason_display() {
        assert_eq!(DropReason::NoRoute.to_string(), "no route to destination");
        assert_eq!(DropReason::TtlExpired.to_string(), "TTL expired");
        assert_eq!(DropReason::NoPort.to_string(), "no port bound to next hop");
        assert_eq!(DropReason::UnknownMessage.to_string(), "unknown message kind");
    }

    #[test]
    fn test_link_up_binds_port_and_advertises() {
        let mut r = router("s1");
        assert_eq!(r.state(), RouterState::NoLinks);

        r.handle_receive(up("s2", NodeKind::Router), PortId(0));
        assert_eq!(r.port_of(&id("s2")), Some(PortId(0)));
        assert_eq!(r.table().best_cost(&id("s2")), Some(1));
        assert_eq!(r.state(), RouterState::Learning);

        // Link transitions always advertise, even with nothing to say
        let vectors = r.transport().vectors_on(PortId(0));
        assert_eq!(vectors.len(), 1);
        assert!(vectors[0].is_empty());
        assert_eq!(r.stats().advertisements_sent, 1);
    }

    #[test]
    fn test_link_to_self_is_ignored() {
        let mut r = router("s1");

        r.handle_receive(up("s1", NodeKind::Router), PortId(0));
        assert_eq!(r.port_of(&id("s1")), None);
        assert_eq!(r.table().neighbors().count(), 0);
        assert_eq!(r.state(), RouterState::NoLinks);
        assert!(r.transport().sent.is_empty());

        r.handle_receive(down("s1", NodeKind::Router), PortId(0));
        assert_eq!(r.state(), RouterState::NoLinks);
        assert!(r.transport().sent.is_empty());
    }

    #[test]
    fn test_link_up_to_host_suppresses_control() {
        let mut r = router("s1");
        r.handle_receive(up("s2", NodeKind::Router), PortId(0));
        r.handle_receive(up("h1", NodeKind::Host), PortId(1));

        assert_eq!(r.table().best_cost(&id("h1")), Some(1));
        assert!(r.transport().vectors_on(PortId(1)).is_empty());
        assert!(r.stats().control_suppressed >= 1);

        // The router neighbor learns about the host
        let last = r.transport().vectors_on(PortId(0)).pop().unwrap().clone();
        assert_eq!(last.cost_of(&id("h1")), Some(1));

        assert!(!r.send(Message::Link(LinkEvent::up(id("s1"), NodeKind::Router)), &id("h1")));
    }

    #[test]
    fn test_distance_vector_triggers_advertisement_only_on_change() {
        let mut r = router("s1");
        r.handle_receive(up("s2", NodeKind::Router), PortId(0));
        r.handle_receive(up("s3", NodeKind::Router), PortId(1));
        let before = r.transport().sent.len();

        let dv = DistanceVector::new(id("s2")).with_entry("h9", 1);
        r.handle_receive(Message::DistanceVector(dv.clone()), PortId(0));
        assert_eq!(r.table().best_cost(&id("h9")), Some(2));
        assert_eq!(r.transport().sent.len(), before + 2);
        assert_eq!(r.state(), RouterState::Learning);

        // Poisoned towards s2, finite towards s3
        let to_s2 = r.transport().vectors_on(PortId(0)).pop().unwrap().clone();
        let to_s3 = r.transport().vectors_on(PortId(1)).pop().unwrap().clone();
        assert_eq!(to_s2.cost_of(&id("h9")), Some(16));
        assert_eq!(to_s3.cost_of(&id("h9")), Some(2));

        r.handle_receive(Message::DistanceVector(dv), PortId(0));
        assert_eq!(r.transport().sent.len(), before + 2);
        assert_eq!(r.state(), RouterState::Converged);
        assert_eq!(r.stats().updates_received, 2);
    }

    #[test]
    fn test_data_forwarding() {
        let mut r = router("s1");
        r.handle_receive(up("s2", NodeKind::Router), PortId(4));
        r.handle_receive(
            Message::DistanceVector(DistanceVector::new(id("s2")).with_entry("h2", 1)),
            PortId(4),
        );
        let before = r.transport().sent.len();

        let pkt = DataPacket::new(id("h1"), id("h2"), Bytes::from_static(b"hello"));
        r.handle_receive(Message::Data(pkt), PortId(7));

        let (port, msg) = r.transport().sent[before].clone();
        assert_eq!(port, PortId(4));
        match msg {
            Message::Data(fwd) => {
                assert_eq!(fwd.dst, id("h2"));
                assert_eq!(fwd.ttl, rip_wire::DEFAULT_DATA_TTL - 1);
                assert_eq!(&fwd.payload[..], b"hello");
            }
            other => panic!("unexpected message: {:?}", other),
        }
        assert_eq!(r.stats().packets_forwarded, 1);
    }

    #[test]
    fn test_data_to_host_neighbor_is_delivered() {
        let mut r = router("s1");
        r.handle_receive(up("h1", NodeKind::Host), PortId(2));

        let pkt = DataPacket::new(id("h0"), id("h1"), Bytes::new());
        r.handle_receive(Message::Data(pkt), PortId(0));

        assert_eq!(r.stats().packets_forwarded, 1);
        assert!(matches!(r.transport().sent.last(), Some((PortId(2), Message::Data(_)))));
    }

    #[test]
    fn test_unroutable_packets_are_dropped() {
        let mut r = router("s1");
        r.handle_receive(up("s2", NodeKind::Router), PortId(0));
        let before = r.transport().sent.len();

        let pkt = DataPacket::new(id("h1"), id("nowhere"), Bytes::new());
        r.handle_receive(Message::Data(pkt), PortId(0));

        let mut expired = DataPacket::new(id("h1"), id("s2"), Bytes::new());
        expired.ttl = 0;
        r.handle_receive(Message::Data(expired), PortId(0));

        assert_eq!(r.transport().sent.len(), before);
        assert_eq!(r.stats().drops(DropReason::NoRoute), 1);
        assert_eq!(r.stats().drops(DropReason::TtlExpired), 1);
        assert_eq!(r.stats().packets_dropped, 2);
    }

    #[test]
    fn test_local_delivery() {
        let mut r = router("s1");
        let pkt = DataPacket::new(id("h1"), id("s1"), Bytes::new());
        r.handle_receive(Message::Data(pkt), PortId(0));
        assert_eq!(r.stats().packets_local, 1);
        assert!(r.transport().sent.is_empty());
    }

    #[test]
    fn test_unknown_message_is_dropped() {
        let mut r = router("s1");
        r.handle_receive(up("s2", NodeKind::Router), PortId(0));
        let routes = r.table().routes();

        r.handle_receive(Message::Unknown, PortId(0));
        assert_eq!(r.stats().drops(DropReason::UnknownMessage), 1);
        assert_eq!(r.table().routes(), routes);
    }

    #[test]
    fn test_link_down_unbinds_and_withdraws() {
        let mut r = router("s1");
        r.handle_receive(up("s2", NodeKind::Router), PortId(0));
        r.handle_receive(up("s3", NodeKind::Router), PortId(1));
        r.handle_receive(
            Message::DistanceVector(DistanceVector::new(id("s3")).with_entry("h3", 1)),
            PortId(1),
        );
        assert_eq!(r.table().best_cost(&id("h3")), Some(2));

        r.handle_receive(down("s3", NodeKind::Router), PortId(1));
        assert_eq!(r.port_of(&id("s3")), None);
        assert_eq!(r.table().best_cost(&id("h3")), None);

        let last = r.transport().vectors_on(PortId(0)).pop().unwrap().clone();
        assert!(last.is_empty());
    }

    #[test]
    fn test_full_reset_policy_on_router_link_loss() {
        let config = TableConfig {
            link_down_policy: LinkDownPolicy::FullReset,
            ..TableConfig::default()
        };
        let mut r = router_with("s1", config);
        r.handle_receive(up("s2", NodeKind::Router), PortId(0));
        r.handle_receive(up("s3", NodeKind::Router), PortId(1));
        r.handle_receive(up("h1", NodeKind::Host), PortId(2));
        r.handle_receive(
            Message::DistanceVector(DistanceVector::new(id("s2")).with_entry("h2", 1)),
            PortId(0),
        );
        r.handle_receive(
            Message::DistanceVector(DistanceVector::new(id("s3")).with_entry("h3", 1)),
            PortId(1),
        );

        // Losing a host keeps learned routes
        r.handle_receive(down("h1", NodeKind::Host), PortId(2));
        assert_eq!(r.table().best_cost(&id("h2")), Some(2));

        // Losing a router forgets everything learned, even via s2
        r.handle_receive(down("s3", NodeKind::Router), PortId(1));
        assert_eq!(r.table().best_cost(&id("h3")), None);
        assert_eq!(r.table().best_cost(&id("h2")), None);
        assert_eq!(r.table().best_cost(&id("s2")), Some(1));
    }
}
