use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Runtime capture settings, assembled from the command line and the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Network interface to capture from
    pub interface: Option<String>,

    /// Replay frames from a pcap file instead of a live interface
    pub read_file: Option<PathBuf>,

    /// Enable promiscuous mode
    pub promiscuous: bool,

    /// BPF filter expression
    pub filter: Option<String>,

    /// Bytes to strip from the front of every captured buffer
    pub prefix_len: usize,
}

/// Contents of the JSON configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub devices: Vec<DeviceConfig>,

    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub stats: StatsConfig,

    #[serde(default)]
    pub web: WebConfig,

    #[serde(default)]
    pub presence: PresenceConfig,

    #[serde(default)]
    pub capture: CaptureConfig,
}

/// A known device on the network
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub mac: String,
    pub name: String,

    /// Whether presence of this device is tracked
    #[serde(default)]
    pub track: bool,
}

/// Where notifications are delivered
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Base URL of the notification endpoint
    #[serde(default)]
    pub url: String,

    /// Topic prefix, the device name or `stats` is appended
    #[serde(default = "default_topic")]
    pub topic: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            topic: default_topic(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsConfig {
    /// Publish periodic snapshots on the `stats` topic
    #[serde(default, alias = "enabled")]
    pub notify: bool,

    /// Seconds between snapshots
    #[serde(default = "default_interval")]
    pub interval: f64,

    /// Maximum number of flows kept
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            notify: false,
            interval: default_interval(),
            max_entries: default_max_entries(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Presence heuristics
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PresenceConfig {
    /// Observations closer together than this count once
    #[serde(default = "default_consecutive_packet_delay")]
    pub consecutive_packet_delay_sec: f64,

    /// Silence after which an appeared device is considered gone
    #[serde(default = "default_max_no_packet")]
    pub max_no_packet_sec: f64,

    /// Debounced observations needed before a device appears
    #[serde(default = "default_min_seen_count")]
    pub min_seen_count: u32,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            consecutive_packet_delay_sec: default_consecutive_packet_delay(),
            max_no_packet_sec: default_max_no_packet(),
            min_seen_count: default_min_seen_count(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptureConfig {
    /// Length prefix in front of every captured frame (2 on W5x00 MACRAW sockets)
    #[serde(default)]
    pub prefix_len: usize,
}

fn default_topic() -> String { "notifications".to_string() }
fn default_interval() -> f64 { 60.0 }
fn default_max_entries() -> usize { 20 }
fn default_true() -> bool { true }
fn default_bind() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 3000 }
fn default_consecutive_packet_delay() -> f64 { 2.0 }
fn default_max_no_packet() -> f64 { 300.0 }
fn default_min_seen_count() -> u32 { 3 }

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// MAC -> device name table for the address mapper
    pub fn mac_address_to_devices(&self) -> HashMap<String, String> {
        self.devices
            .iter()
            .map(|d| (d.mac.clone(), d.name.clone()))
            .collect()
    }

    /// Names of devices whose presence is tracked, in file order
    pub fn tracking_devices(&self) -> Vec<String> {
        self.devices
            .iter()
            .filter(|d| d.track)
            .map(|d| d.name.clone())
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
