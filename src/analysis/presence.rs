use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::config::PresenceConfig;
use crate::models::device::{DeviceState, PresenceEvent, PresenceEventType, Timestamp};
use crate::models::packet::Packet;
use crate::notify::{NotificationSink, TrackingSink};

/// Decides when tracked devices appear on and disappear from the network.
///
/// A device appears once it has produced `min_seen_count` debounced observations spread over
/// more than `consecutive_packet_delay_sec`. It disappears after `max_no_packet_sec` without
/// traffic, but only when some tracked device's traffic triggers a check: expiry is lazy.
pub struct PresenceEngine {
    config: PresenceConfig,

    /// Tracked names in configuration order, which is also the disappearance scan order
    tracked: Vec<String>,

    devices: HashMap<String, DeviceState>,

    notifier: Option<Arc<dyn NotificationSink>>,
    tracker: Option<Arc<dyn TrackingSink>>,
}

impl PresenceEngine {
    pub fn new(config: PresenceConfig, tracked: Vec<String>) -> Self {
        let mut unique = Vec::with_capacity(tracked.len());
        for name in tracked {
            if !name.is_empty() && !unique.contains(&name) {
                unique.push(name);
            }
        }

        Self {
            config,
            tracked: unique,
            devices: HashMap::new(),
            notifier: None,
            tracker: None,
        }
    }

    /// Publish every event on the device's topic
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Record every event as the device's latest
    pub fn with_tracker(mut self, tracker: Arc<dyn TrackingSink>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn is_tracked(&self, device: &str) -> bool {
        self.tracked.iter().any(|name| name == device)
    }

    pub fn tracked_devices(&self) -> &[String] {
        &self.tracked
    }

    /// Current state of every tracked device seen so far
    pub fn devices(&self) -> &HashMap<String, DeviceState> {
        &self.devices
    }

    pub fn device(&self, name: &str) -> Option<&DeviceState> {
        self.devices.get(name)
    }

    /// Feed one annotated packet observed at `now`; returns the events it caused
    pub fn update(&mut self, packet: &Packet, now: Timestamp) -> Vec<PresenceEvent> {
        // Destination wins when both ends are tracked
        let device = if self.is_tracked(&packet.dst_device) {
            packet.dst_device.clone()
        } else if self.is_tracked(&packet.src_device) {
            packet.src_device.clone()
        } else {
            return Vec::new();
        };

        let delay = self.config.consecutive_packet_delay_sec;
        let min_seen_count = self.config.min_seen_count;

        let state = self.devices.entry(device.clone()).or_default();
        let prior_last_seen = state.last_seen;
        state.last_seen = Some(now);
        state.previous_seen = prior_last_seen;
        let first_seen = *state.first_seen.get_or_insert(now);

        // Bursts inside one delay window count once
        let debounced = prior_last_seen.map_or(true, |prior| now - prior >= delay);
        if debounced {
            state.seen_count += 1;
        }
        debug!("{}: {:?}", device, state);

        let mut events = Vec::new();
        if !state.is_appeared() && now - first_seen > delay && state.seen_count >= min_seen_count {
            state.appeared_since = Some(now);
            state.disappeared_since = None;
            info!("{} appeared: {:?}", device, state);
            events.push(PresenceEvent::new(PresenceEventType::Appeared, &device, state.clone()));
        }

        events.extend(self.check_disappeared(now));

        for event in &events {
            self.deliver(event);
        }
        events
    }

    /// Mark every appeared device silent for too long as disappeared
    fn check_disappeared(&mut self, now: Timestamp) -> Vec<PresenceEvent> {
        let max_silence = self.config.max_no_packet_sec;
        let mut events = Vec::new();

        for name in &self.tracked {
            let state = match self.devices.get_mut(name) {
                Some(state) if state.is_appeared() && !state.is_disappeared() => state,
                _ => continue,
            };

            let silent = state.last_seen.map_or(false, |last| now - last > max_silence);
            if silent {
                state.appeared_since = None;
                state.disappeared_since = Some(now);
                info!("{} disappeared: {:?}", name, state);
                events.push(PresenceEvent::new(PresenceEventType::Disappeared, name, state.clone()));
            }
        }

        events
    }

    /// Hand an event to both sinks; delivery problems never stop processing
    fn deliver(&self, event: &PresenceEvent) {
        if let Some(notifier) = &self.notifier {
            match serde_json::to_string(event) {
                Ok(message) => {
                    if let Err(e) = notifier.notify(&event.device, &message) {
                        warn!("Failed to notify {:?} event for {}: {}",
                              event.event_type, event.device, e);
                    }
                }
                Err(e) => warn!("Failed to serialize event for {}: {}", event.device, e),
            }
        }

        if let Some(tracker) = &self.tracker {
            tracker.track(&event.device, event);
        }
    }
}
