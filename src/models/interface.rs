use pnet_datalink::NetworkInterface;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// A capture-capable network interface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceInfo {
    /// Device system name (used for capture operations)
    pub device_name: String,

    /// First IPv4 address, if any
    pub ipv4_address: Option<String>,

    /// MAC address, if the interface has one
    pub mac_address: Option<String>,

    pub is_loopback: bool,
    pub is_up: bool,
}

impl InterfaceInfo {
    pub fn from_pnet(iface: &NetworkInterface) -> Self {
        let ipv4_address = iface.ips.iter().find_map(|ip| match ip.ip() {
            IpAddr::V4(ipv4) => Some(ipv4.to_string()),
            IpAddr::V6(_) => None,
        });

        Self {
            device_name: iface.name.clone(),
            ipv4_address,
            mac_address: iface.mac.map(|mac| mac.to_string()),
            is_loopback: iface.is_loopback(),
            is_up: iface.is_up(),
        }
    }

    /// Up, not loopback, and carrying a hardware address
    pub fn is_capture_candidate(&self) -> bool {
        self.is_up && !self.is_loopback && self.mac_address.is_some()
    }

    /// Get a formatted string with interface name and IP (if available)
    pub fn formatted_display(&self) -> String {
        match &self.ipv4_address {
            Some(ip) => format!("{} ({})", self.device_name, ip),
            None => self.device_name.clone(),
        }
    }
}

/// Interfaces reported by the OS
pub fn list_interfaces() -> Vec<InterfaceInfo> {
    pnet_datalink::interfaces()
        .iter()
        .map(InterfaceInfo::from_pnet)
        .collect()
}

/// First interface suitable for sniffing the local segment
pub fn default_interface() -> Option<InterfaceInfo> {
    list_interfaces()
        .into_iter()
        .find(InterfaceInfo::is_capture_candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(is_up: bool, is_loopback: bool, mac: Option<&str>) -> InterfaceInfo {
        InterfaceInfo {
            device_name: "eth0".to_string(),
            ipv4_address: Some("192.168.1.10".to_string()),
            mac_address: mac.map(str::to_string),
            is_loopback,
            is_up,
        }
    }

    #[test]
    fn capture_candidate_needs_up_non_loopback_with_mac() {
        assert!(info(true, false, Some("02:00:00:00:00:01")).is_capture_candidate());
        assert!(!info(false, false, Some("02:00:00:00:00:01")).is_capture_candidate());
        assert!(!info(true, true, Some("00:00:00:00:00:00")).is_capture_candidate());
        assert!(!info(true, false, None).is_capture_candidate());
    }

    #[test]
    fn display_includes_ip() {
        assert_eq!(info(true, false, None).formatted_display(), "eth0 (192.168.1.10)");
    }
}
