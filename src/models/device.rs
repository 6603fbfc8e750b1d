use serde::{Serialize, Serializer};

/// Fractional seconds since the Unix epoch
pub type Timestamp = f64;

/// Presence bookkeeping for one tracked device
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceState {
    /// First observation
    #[serde(serialize_with = "zero_if_unset")]
    pub first_seen: Option<Timestamp>,

    /// Most recent observation
    #[serde(serialize_with = "zero_if_unset")]
    pub last_seen: Option<Timestamp>,

    /// `last_seen` as it was before the most recent observation
    #[serde(serialize_with = "zero_if_unset")]
    pub previous_seen: Option<Timestamp>,

    /// Debounced observation count
    pub seen_count: u32,

    /// Set while the device is considered present
    #[serde(serialize_with = "zero_if_unset")]
    pub appeared_since: Option<Timestamp>,

    /// Set while the device is considered gone
    #[serde(serialize_with = "zero_if_unset")]
    pub disappeared_since: Option<Timestamp>,
}

impl DeviceState {
    pub fn is_appeared(&self) -> bool {
        self.appeared_since.is_some()
    }

    pub fn is_disappeared(&self) -> bool {
        self.disappeared_since.is_some()
    }
}

/// Unset timestamps go over the wire as 0
fn zero_if_unset<S: Serializer>(value: &Option<Timestamp>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.unwrap_or(0.0))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceEventType {
    Appeared,
    Disappeared,
}

/// A presence transition, serialized as `{"type": ..., "data": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresenceEvent {
    /// Device the transition belongs to; carried by the topic, not the body
    #[serde(skip)]
    pub device: String,

    #[serde(rename = "type")]
    pub event_type: PresenceEventType,

    /// State right after the transition
    pub data: DeviceState,
}

impl PresenceEvent {
    pub fn new(event_type: PresenceEventType, device: &str, data: DeviceState) -> Self {
        Self {
            device: device.to_string(),
            event_type,
            data,
        }
    }
}
