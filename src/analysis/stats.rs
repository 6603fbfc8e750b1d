use log::{debug, warn};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use crate::models::config::StatsConfig;
use crate::models::device::Timestamp;
use crate::models::packet::Packet;
use crate::models::stats::{FlowEntry, FlowKey, StatsSnapshot};
use crate::notify::tracker::EventTracker;
use crate::notify::NotificationSink;

/// Topic periodic snapshots are published on
pub const STATS_TOPIC: &str = "stats";

/// Flow entries bounded by count, evicted oldest-inserted first.
///
/// Updating an entry does not refresh its position.
#[derive(Debug)]
struct FlowTable {
    entries: HashMap<FlowKey, FlowEntry>,
    order: VecDeque<FlowKey>,
    max_entries: usize,
}

impl FlowTable {
    fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            max_entries: max_entries.max(1),
        }
    }

    fn get_mut(&mut self, key: &FlowKey) -> Option<&mut FlowEntry> {
        self.entries.get_mut(key)
    }

    /// Insert a new flow, evicting the oldest ones to stay within capacity
    fn insert(&mut self, key: FlowKey, entry: FlowEntry) {
        while self.order.len() >= self.max_entries {
            match self.order.pop_front() {
                Some(oldest) => {
                    debug!("Evicting flow {}", oldest);
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, entry);
    }

    /// Entries in insertion order
    fn iter(&self) -> impl Iterator<Item = &FlowEntry> {
        self.order.iter().filter_map(|key| self.entries.get(key))
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

/// Aggregates packet counters per type and per directed MAC flow.
///
/// When a notification sink is attached, a snapshot is published on the `stats` topic from
/// within `update` once `notify_every_seconds` have passed since the previous one. There is no
/// timer: a quiet network delays the snapshot until the next packet.
pub struct StatsAggregator {
    packets_count: u64,
    packet_types: BTreeMap<String, u64>,
    flows: FlowTable,

    /// Source of the `events` section of snapshots
    tracker: EventTracker,

    notifier: Option<Arc<dyn NotificationSink>>,
    notify_every_seconds: f64,
    last_snapshot: Timestamp,
}

impl StatsAggregator {
    pub fn new(config: &StatsConfig, tracker: EventTracker, started_at: Timestamp) -> Self {
        Self {
            packets_count: 0,
            packet_types: BTreeMap::new(),
            flows: FlowTable::new(config.max_entries),
            tracker,
            notifier: None,
            notify_every_seconds: config.interval,
            last_snapshot: started_at,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Count one annotated packet; returns the snapshot if one was published
    pub fn update(&mut self, packet: &Packet, now: Timestamp) -> Option<StatsSnapshot> {
        self.packets_count += 1;
        *self
            .packet_types
            .entry(packet.kind.label().to_string())
            .or_insert(0) += 1;

        let key = FlowKey::of(packet);
        match self.flows.get_mut(&key) {
            Some(flow) => flow.record(packet),
            None => self.flows.insert(key.clone(), FlowEntry::first(packet)),
        }

        if let Some(header) = packet.kind.ipv4_well_formed() {
            if let Some(flow) = self.flows.get_mut(&key) {
                flow.src_ip = header.src_ip.clone();
                flow.dst_ip = header.dst_ip.clone();
            }
        }

        self.maybe_publish(now)
    }

    fn maybe_publish(&mut self, now: Timestamp) -> Option<StatsSnapshot> {
        let notifier = self.notifier.as_ref()?;
        if now - self.last_snapshot < self.notify_every_seconds {
            return None;
        }

        let snapshot = self.snapshot();
        match serde_json::to_string(&snapshot) {
            Ok(message) => {
                if let Err(e) = notifier.notify(STATS_TOPIC, &message) {
                    warn!("Failed to publish stats snapshot: {}", e);
                }
            }
            Err(e) => warn!("Failed to serialize stats snapshot: {}", e),
        }
        self.last_snapshot = now;
        Some(snapshot)
    }

    /// Current counters, flows and latest events
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            packets_count: self.packets_count,
            stats: self.flows.iter().cloned().collect(),
            packet_types: self.packet_types.clone(),
            events: self.tracker.snapshot(),
        }
    }

    /// Up to `limit` flows with the most packets, busiest first
    pub fn top_flows(&self, limit: usize) -> Vec<FlowEntry> {
        let mut flows: Vec<FlowEntry> = self.flows.iter().cloned().collect();
        // Stable sort keeps insertion order among equal counts
        flows.sort_by(|a, b| b.packets_count.cmp(&a.packets_count));
        flows.truncate(limit);
        flows
    }

    pub fn flow(&self, key: &FlowKey) -> Option<&FlowEntry> {
        self.flows.entries.get(key)
    }

    pub fn flows_len(&self) -> usize {
        self.flows.len()
    }

    pub fn packets_count(&self) -> u64 {
        self.packets_count
    }

    pub fn packet_types(&self) -> &BTreeMap<String, u64> {
        &self.packet_types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::parser::PacketParser;
    use crate::models::device::{DeviceState, PresenceEvent, PresenceEventType};
    use crate::notify::TrackingSink;
    use crate::utils::error::SinkError;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        messages: Mutex<Vec<(String, String)>>,
    }

    impl NotificationSink for RecordingSink {
        fn notify(&self, topic: &str, message: &str) -> Result<(), SinkError> {
            self.messages.lock().push((topic.to_string(), message.to_string()));
            Ok(())
        }
    }

    fn config(max_entries: usize) -> StatsConfig {
        StatsConfig {
            notify: true,
            interval: 60.0,
            max_entries,
        }
    }

    fn mac(last: u8) -> [u8; 6] {
        [0x02, 0, 0, 0, 0, last]
    }

    fn frame(src: [u8; 6], dst: [u8; 6], ethertype: u16, payload: &[u8]) -> Packet {
        let mut data = Vec::new();
        data.extend_from_slice(&dst);
        data.extend_from_slice(&src);
        data.extend_from_slice(&ethertype.to_be_bytes());
        data.extend_from_slice(payload);
        PacketParser::new().parse_packet(&data)
    }

    fn ipv4(src_ip: [u8; 4], dst_ip: [u8; 4]) -> Vec<u8> {
        let mut header = vec![0u8; 20];
        header[0] = 0x45;
        header[8] = 64;
        header[9] = 6;
        header[12..16].copy_from_slice(&src_ip);
        header[16..20].copy_from_slice(&dst_ip);
        header
    }

    #[test]
    fn counts_totals_and_types() {
        let mut stats = StatsAggregator::new(&config(20), EventTracker::new(), 0.0);
        stats.update(&frame(mac(1), mac(2), 0x0806, &[0, 1, 8, 0, 6, 4, 0, 1]), 1.0);
        stats.update(&frame(mac(2), mac(1), 0x0806, &[0, 1, 8, 0, 6, 4, 0, 2]), 1.0);
        stats.update(&frame(mac(1), mac(2), 0x0800, &ipv4([10, 0, 0, 1], [10, 0, 0, 2])), 1.0);

        assert_eq!(stats.packets_count(), 3);
        assert_eq!(stats.packet_types()["arp"], 2);
        assert_eq!(stats.packet_types()["ipv4"], 1);
        // Directed flows: 1->2 and 2->1 are distinct
        assert_eq!(stats.flows_len(), 2);

        let flow = stats.flow(&FlowKey::new("02:00:00:00:00:01", "02:00:00:00:00:02")).unwrap();
        assert_eq!(flow.packets_count, 2);
        assert_eq!(flow.packet_types["arp"], 1);
        assert_eq!(flow.packet_types["ipv4"], 1);
        assert_eq!(flow.src_ip, "10.0.0.1");
        assert_eq!(flow.dst_ip, "10.0.0.2");
    }

    #[test]
    fn malformed_ipv4_keeps_previous_addresses() {
        let mut stats = StatsAggregator::new(&config(20), EventTracker::new(), 0.0);
        stats.update(&frame(mac(1), mac(2), 0x0800, &ipv4([10, 0, 0, 1], [10, 0, 0, 2])), 1.0);
        stats.update(&frame(mac(1), mac(2), 0x0800, &[0x45, 0, 0]), 2.0);

        let flow = stats.flow(&FlowKey::new("02:00:00:00:00:01", "02:00:00:00:00:02")).unwrap();
        assert_eq!(flow.packets_count, 2);
        assert_eq!(flow.packet_types["ipv4"], 2);
        assert_eq!(flow.src_ip, "10.0.0.1");
    }

    #[test]
    fn truncated_nested_icmp_keeps_previous_addresses() {
        let mut stats = StatsAggregator::new(&config(20), EventTracker::new(), 0.0);
        let mut echo = ipv4([10, 0, 0, 1], [10, 0, 0, 2]);
        echo[9] = 1;
        echo.extend_from_slice(&[8, 0, 0xf7, 0xff]);
        stats.update(&frame(mac(1), mac(2), 0x0800, &echo), 1.0);

        let mut short_echo = ipv4([6, 6, 6, 6], [10, 0, 0, 2]);
        short_echo[9] = 1;
        short_echo.push(8);
        let packet = frame(mac(1), mac(2), 0x0800, &short_echo);
        assert!(packet.kind.error().is_some());
        stats.update(&packet, 2.0);

        let flow = stats.flow(&FlowKey::new("02:00:00:00:00:01", "02:00:00:00:00:02")).unwrap();
        assert_eq!(flow.packets_count, 2);
        assert_eq!(flow.packet_types["ipv4"], 2);
        assert_eq!(flow.src_ip, "10.0.0.1");
        assert_eq!(flow.dst_ip, "10.0.0.2");
    }

    #[test]
    fn new_flow_has_empty_addresses_until_ipv4() {
        let mut stats = StatsAggregator::new(&config(20), EventTracker::new(), 0.0);
        stats.update(&frame(mac(1), mac(2), 0x86dd, &[0x60; 40]), 1.0);
        let flow = stats.flow(&FlowKey::new("02:00:00:00:00:01", "02:00:00:00:00:02")).unwrap();
        assert_eq!(flow.src_ip, "");
        assert_eq!(flow.dst_ip, "");
    }

    #[test]
    fn unknown_type_key_changes_after_first_packet() {
        let mut stats = StatsAggregator::new(&config(20), EventTracker::new(), 0.0);
        for t in 0..4 {
            stats.update(&frame(mac(1), mac(2), 0x88cc, &[0; 30]), t as f64);
        }

        let flow = stats.flow(&FlowKey::new("02:00:00:00:00:01", "02:00:00:00:00:02")).unwrap();
        assert_eq!(flow.packet_types["unknown"], 1);
        assert_eq!(flow.packet_types["88cc"], 3);
        assert_eq!(flow.packet_types.values().sum::<u64>(), flow.packets_count);
        // Global counters always use the label
        assert_eq!(stats.packet_types()["unknown"], 4);
    }

    #[test]
    fn evicts_first_inserted_flow() {
        let max_entries = 3;
        let mut stats = StatsAggregator::new(&config(max_entries), EventTracker::new(), 0.0);
        for i in 1..=max_entries as u8 {
            stats.update(&frame(mac(i), mac(100), 0x0806, &[0; 8]), 0.0);
        }
        // Touching the oldest flow does not protect it
        stats.update(&frame(mac(1), mac(100), 0x0806, &[0; 8]), 0.0);
        assert_eq!(stats.flows_len(), max_entries);

        stats.update(&frame(mac(42), mac(100), 0x0806, &[0; 8]), 0.0);
        assert_eq!(stats.flows_len(), max_entries);
        assert!(stats.flow(&FlowKey::new("02:00:00:00:00:01", "02:00:00:00:00:64")).is_none());
        assert!(stats.flow(&FlowKey::new("02:00:00:00:00:02", "02:00:00:00:00:64")).is_some());
        assert!(stats.flow(&FlowKey::new("02:00:00:00:00:2a", "02:00:00:00:00:64")).is_some());

        let order: Vec<String> = stats.snapshot().stats.iter().map(|f| f.src_mac.clone()).collect();
        assert_eq!(order, vec!["02:00:00:00:00:02", "02:00:00:00:00:03", "02:00:00:00:00:2a"]);
    }

    #[test]
    fn size_never_exceeds_capacity() {
        let mut stats = StatsAggregator::new(&config(5), EventTracker::new(), 0.0);
        for i in 0..50u8 {
            stats.update(&frame(mac(i), mac(i.wrapping_mul(7)), 0x0806, &[0; 8]), 0.0);
            assert!(stats.flows_len() <= 5);
        }
    }

    #[test]
    fn top_flows_sorted_by_count() {
        let mut stats = StatsAggregator::new(&config(20), EventTracker::new(), 0.0);
        for (i, repeat) in [(1u8, 1), (2, 5), (3, 3)] {
            for _ in 0..repeat {
                stats.update(&frame(mac(i), mac(9), 0x0806, &[0; 8]), 0.0);
            }
        }

        let top = stats.top_flows(2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].packets_count, 5);
        assert_eq!(top[1].packets_count, 3);
    }

    #[test]
    fn publishes_snapshot_after_interval() {
        let sink = Arc::new(RecordingSink::default());
        let tracker = EventTracker::new();
        let mut stats = StatsAggregator::new(&config(20), tracker.clone(), 100.0)
            .with_notifier(sink.clone());

        let event = PresenceEvent::new(PresenceEventType::Appeared, "phone", DeviceState::default());
        tracker.track("phone", &event);

        let arp = frame(mac(1), mac(2), 0x0806, &[0; 8]);
        assert!(stats.update(&arp, 130.0).is_none());
        assert!(stats.update(&arp, 160.0).is_some());
        assert!(stats.update(&arp, 200.0).is_none());
        assert!(stats.update(&arp, 220.0).is_some());

        let messages = sink.messages.lock();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].0, STATS_TOPIC);

        let body: serde_json::Value = serde_json::from_str(&messages[0].1).unwrap();
        assert_eq!(body["packets_count"], 2);
        assert_eq!(body["packet_types"]["arp"], 2);
        assert_eq!(body["events"]["phone"]["type"], "appeared");
        let flow = &body["stats"]["02:00:00:00:00:01-02:00:00:00:00:02"];
        assert_eq!(flow["packets_count"], 2);
        assert_eq!(flow["src_device"], "");
        assert_eq!(flow["packet_types"]["arp"], 2);
    }

    #[test]
    fn no_snapshot_without_notifier() {
        let mut stats = StatsAggregator::new(&config(20), EventTracker::new(), 0.0);
        let arp = frame(mac(1), mac(2), 0x0806, &[0; 8]);
        assert!(stats.update(&arp, 1_000.0).is_none());
    }
}
