use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::models::device::PresenceEvent;
use crate::models::packet::Packet;

/// Directed (source, destination) MAC pair; A->B and B->A are distinct flows
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub src_mac: String,
    pub dst_mac: String,
}

impl FlowKey {
    pub fn new(src_mac: &str, dst_mac: &str) -> Self {
        Self {
            src_mac: src_mac.to_string(),
            dst_mac: dst_mac.to_string(),
        }
    }

    pub fn of(packet: &Packet) -> Self {
        Self::new(&packet.src_mac, &packet.dst_mac)
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.src_mac, self.dst_mac)
    }
}

/// Counters for one flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowEntry {
    pub src_mac: String,

    /// Captured when the flow was first seen, never refreshed
    pub src_device: String,

    pub dst_mac: String,

    /// Captured when the flow was first seen, never refreshed
    pub dst_device: String,

    /// Packets seen on this flow
    pub packets_count: u64,

    /// Packets per type label
    pub packet_types: BTreeMap<String, u64>,

    /// Last source address of a well-formed IPv4 packet
    pub src_ip: String,

    /// Last destination address of a well-formed IPv4 packet
    pub dst_ip: String,
}

impl FlowEntry {
    /// Entry for the first packet of a flow
    pub fn first(packet: &Packet) -> Self {
        let mut packet_types = BTreeMap::new();
        packet_types.insert(packet.kind.label().to_string(), 1);

        Self {
            src_mac: packet.src_mac.clone(),
            src_device: packet.src_device.clone(),
            dst_mac: packet.dst_mac.clone(),
            dst_device: packet.dst_device.clone(),
            packets_count: 1,
            packet_types,
            src_ip: String::new(),
            dst_ip: String::new(),
        }
    }

    /// Count a further packet on an existing flow.
    ///
    /// Unknown packets are keyed by their hex EtherType here, while the first packet of a flow
    /// is always keyed by its label. The asymmetry is long-standing dashboard behavior.
    pub fn record(&mut self, packet: &Packet) {
        self.packets_count += 1;

        let type_key = if packet.kind.is_unknown() {
            packet
                .ether_type_hex()
                .unwrap_or_else(|| packet.kind.label().to_string())
        } else {
            packet.kind.label().to_string()
        };
        *self.packet_types.entry(type_key).or_insert(0) += 1;
    }

    pub fn key(&self) -> FlowKey {
        FlowKey::new(&self.src_mac, &self.dst_mac)
    }
}

/// Serialized statistics payload, published on the `stats` topic and served by the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    /// Total packets processed
    pub packets_count: u64,

    /// Flows in insertion order, serialized as a map keyed by `src-dst`
    #[serde(serialize_with = "flows_by_key")]
    pub stats: Vec<FlowEntry>,

    /// Packets per type label
    pub packet_types: BTreeMap<String, u64>,

    /// Latest presence event per device
    pub events: BTreeMap<String, PresenceEvent>,
}

fn flows_by_key<S: Serializer>(flows: &[FlowEntry], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(flows.len()))?;
    for flow in flows {
        map.serialize_entry(&flow.key().to_string(), flow)?;
    }
    map.end()
}
