use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::models::config::ConfigError;

/// Protocol layer a decode error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Ethernet,
    Ipv4,
    Ipv6,
    Arp,
    Icmp,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Layer::Ethernet => "Ethernet",
            Layer::Ipv4 => "IPv4",
            Layer::Ipv6 => "IPv6",
            Layer::Arp => "ARP",
            Layer::Icmp => "ICMP",
        };
        f.write_str(name)
    }
}

/// Error marker attached to a header that could not be decoded
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DecodeError {
    /// Not enough bytes left for the fixed part of the header
    #[error("{layer} header truncated: need {needed} bytes, got {available}")]
    Truncated {
        layer: Layer,
        needed: usize,
        available: usize,
    },
}

impl DecodeError {
    pub fn truncated(layer: Layer, needed: usize, available: usize) -> Self {
        DecodeError::Truncated {
            layer,
            needed,
            available,
        }
    }

    /// Layer the error was raised at
    pub fn layer(&self) -> Layer {
        match self {
            DecodeError::Truncated { layer, .. } => *layer,
        }
    }
}

/// Errors raised while handing a message to a notification sink
#[derive(Error, Debug)]
pub enum SinkError {
    /// The delivery worker has shut down
    #[error("notification channel closed")]
    ChannelClosed,

    /// Message could not be serialized
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error from the HTTP client
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from pcap library
    #[error("PCAP error: {0}")]
    PcapError(#[from] pcap::Error),

    /// Error from loading the configuration file
    #[error(transparent)]
    ConfigError(#[from] ConfigError),

    /// Configuration parsed but is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Error from notification delivery
    #[error("Notification error: {0}")]
    SinkError(#[from] SinkError),

    /// Error from capture operations
    #[error("Capture error: {0}")]
    CaptureError(String),
}

/// Result type for application
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_error_names_layer_and_sizes() {
        let err = DecodeError::truncated(Layer::Ipv4, 20, 7);
        assert_eq!(err.layer(), Layer::Ipv4);
        assert_eq!(err.to_string(), "IPv4 header truncated: need 20 bytes, got 7");
    }

    #[test]
    fn config_failures_stay_config_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "config.json");
        let err: AppError = ConfigError::from(io).into();
        assert!(matches!(err, AppError::ConfigError(ConfigError::Io(_))));
        assert_eq!(err.to_string(), "Config I/O error: config.json");
    }
}
