use chrono::Utc;

use crate::models::device::Timestamp;

/// Current wall-clock time as fractional seconds since the Unix epoch
pub fn now_timestamp() -> Timestamp {
    Utc::now().timestamp_millis() as Timestamp / 1000.0
}
