use parking_lot::Mutex;
use std::sync::Arc;

use crate::analysis::mapper::AddressMapper;
use crate::analysis::presence::PresenceEngine;
use crate::analysis::stats::StatsAggregator;
use crate::capture::parser::PacketParser;
use crate::models::config::Config;
use crate::models::device::{PresenceEvent, Timestamp};
use crate::models::packet::Packet;
use crate::notify::tracker::EventTracker;
use crate::notify::NotificationSink;

/// Pipeline shared between the capture thread and the dashboard
pub type SharedPipeline = Arc<Mutex<Pipeline>>;

/// Device name given to MACs missing from the configuration
pub const UNKNOWN_DEVICE: &str = "";

/// Runs every frame through decode, annotate, presence and stats, in that order
pub struct Pipeline {
    parser: PacketParser,
    mapper: AddressMapper,
    presence: PresenceEngine,
    stats: StatsAggregator,
    tracker: EventTracker,
    frames: u64,
}

impl Pipeline {
    pub fn new(
        mapper: AddressMapper,
        presence: PresenceEngine,
        stats: StatsAggregator,
        tracker: EventTracker,
    ) -> Self {
        Self {
            parser: PacketParser::new(),
            mapper,
            presence,
            stats,
            tracker,
            frames: 0,
        }
    }

    /// Wire up every component from the configuration file.
    ///
    /// `notifier` receives presence events. Stats snapshots are only published when
    /// `stats.notify` is set.
    pub fn from_config(
        config: &Config,
        pass_through: bool,
        notifier: Option<Arc<dyn NotificationSink>>,
        now: Timestamp,
    ) -> Self {
        let tracker = EventTracker::new();

        let mapper = AddressMapper::new(config.mac_address_to_devices())
            .with_pass_through(pass_through);

        let mut presence = PresenceEngine::new(config.presence, config.tracking_devices())
            .with_tracker(Arc::new(tracker.clone()));
        let mut stats = StatsAggregator::new(&config.stats, tracker.clone(), now);

        if let Some(notifier) = notifier {
            presence = presence.with_notifier(notifier.clone());
            if config.stats.notify {
                stats = stats.with_notifier(notifier);
            }
        }

        Self::new(mapper, presence, stats, tracker)
    }

    pub fn into_shared(self) -> SharedPipeline {
        Arc::new(Mutex::new(self))
    }

    /// Process one raw frame (prefix already stripped) observed at `now`
    pub fn process_frame(&mut self, raw: &[u8], now: Timestamp) -> Vec<PresenceEvent> {
        self.frames += 1;

        let mut packet = self.parser.parse_packet(raw);
        self.mapper.annotate(&mut packet, UNKNOWN_DEVICE);
        self.process_packet(&packet, now)
    }

    /// Feed an already decoded and annotated packet to presence, then stats
    pub fn process_packet(&mut self, packet: &Packet, now: Timestamp) -> Vec<PresenceEvent> {
        let events = self.presence.update(packet, now);
        self.stats.update(packet, now);
        events
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn mapper(&self) -> &AddressMapper {
        &self.mapper
    }

    pub fn presence(&self) -> &PresenceEngine {
        &self.presence
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    pub fn tracker(&self) -> &EventTracker {
        &self.tracker
    }
}
