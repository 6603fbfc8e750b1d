pub mod http;
pub mod tracker;

use log::info;

use crate::models::device::PresenceEvent;
use crate::utils::error::SinkError;

/// Fire-and-forget delivery of serialized messages
pub trait NotificationSink: Send + Sync {
    /// Publish `message` under `topic` (a device name, or `stats`)
    fn notify(&self, topic: &str, message: &str) -> Result<(), SinkError>;
}

/// Keeps the latest presence event per device
pub trait TrackingSink: Send + Sync {
    fn track(&self, device: &str, event: &PresenceEvent);
}

/// Writes notifications to the log; used when no transport is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, topic: &str, message: &str) -> Result<(), SinkError> {
        info!("[{}] {}", topic, message);
        Ok(())
    }
}
