//! Passive LAN sniffer: decodes Ethernet frames, names known devices, reports when tracked
//! devices appear or disappear, and keeps per-flow traffic statistics.

pub mod analysis;
pub mod api;
pub mod capture;
pub mod models;
pub mod notify;
pub mod utils;
