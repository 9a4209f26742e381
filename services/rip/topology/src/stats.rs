//! Network-wide counters shared by every node task

use dashmap::DashMap;
use rip_routing::RouteObserver;
use rip_wire::{DataPacket, NodeId};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters collected across all nodes of a simulated network
#[derive(Debug, Default)]
pub struct NetworkStats {
    /// Advertisements produced per router
    advertisements: DashMap<NodeId, u64>,
    /// Data packets that reached their destination host
    delivered: DashMap<NodeId, Vec<DataPacket>>,
    /// Frames handed to links
    frames_sent: AtomicU64,
    /// Frames that could not be decoded
    frames_malformed: AtomicU64,
    /// Routing control that reached a host
    stray_control: AtomicU64,
}

impl NetworkStats {
    /// Create empty counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Total advertisements produced by all routers
    pub fn total_advertisements(&self) -> u64 {
        self.advertisements.iter().map(|entry| *entry.value()).sum()
    }

    /// Advertisements produced by one router
    pub fn advertisements_by(&self, node: &NodeId) -> u64 {
        self.advertisements.get(node).map(|entry| *entry.value()).unwrap_or(0)
    }

    /// Data packets delivered to `host`, in arrival order
    pub fn delivered_to(&self, host: &NodeId) -> Vec<DataPacket> {
        self.delivered
            .get(host)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Frames handed to links so far
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    /// Frames dropped because they failed to decode
    pub fn frames_malformed(&self) -> u64 {
        self.frames_malformed.load(Ordering::Relaxed)
    }

    /// Routing control messages that reached a host. Should stay zero.
    pub fn stray_control(&self) -> u64 {
        self.stray_control.load(Ordering::Relaxed)
    }

    pub(crate) fn record_delivery(&self, host: &NodeId, packet: DataPacket) {
        self.delivered.entry(host.clone()).or_default().push(packet);
    }

    pub(crate) fn record_frame(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_malformed(&self) {
        self.frames_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stray_control(&self) {
        self.stray_control.fetch_add(1, Ordering::Relaxed);
    }
}

impl RouteObserver for NetworkStats {
    fn on_advertise(&self, owner: &NodeId, count: usize) {
        *self.advertisements.entry(owner.clone()).or_insert(0) += count as u64;
    }
}
