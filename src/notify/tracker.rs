use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::models::device::PresenceEvent;
use crate::notify::TrackingSink;

/// Latest presence event per device.
///
/// Cloning shares the underlying map, so the presence engine can write while the stats
/// aggregator and the dashboard read.
#[derive(Debug, Clone, Default)]
pub struct EventTracker {
    events: Arc<DashMap<String, PresenceEvent>>,
}

impl EventTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self, device: &str) -> Option<PresenceEvent> {
        self.events.get(device).map(|event| event.clone())
    }

    /// Copy of all tracked events, ordered by device name
    pub fn snapshot(&self) -> BTreeMap<String, PresenceEvent> {
        self.events
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl TrackingSink for EventTracker {
    fn track(&self, device: &str, event: &PresenceEvent) {
        self.events.insert(device.to_string(), event.clone());
    }
}
