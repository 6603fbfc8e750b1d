use serde::Serialize;

use crate::utils::error::DecodeError;

/// Outcome of decoding one protocol header
pub type Decoded<T> = Result<T, DecodeError>;

/// Represents one decoded link-layer frame
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Layer 2 source (lowercase colon-hex), empty if the frame was truncated
    pub src_mac: String,

    /// Layer 2 destination (lowercase colon-hex), empty if the frame was truncated
    pub dst_mac: String,

    /// Raw EtherType, absent if the Ethernet header itself was truncated
    pub ether_type: Option<u16>,

    /// Classified payload
    pub kind: PacketKind,

    /// Device name resolved for `src_mac`
    pub src_device: String,

    /// Device name resolved for `dst_mac`
    pub dst_device: String,

    /// Number of bytes handed to the decoder
    pub length: usize,
}

impl Packet {
    /// Packet for a buffer too short to hold an Ethernet header
    pub fn truncated(length: usize, error: DecodeError) -> Self {
        Self {
            src_mac: String::new(),
            dst_mac: String::new(),
            ether_type: None,
            kind: PacketKind::Unknown(Some(error)),
            src_device: String::new(),
            dst_device: String::new(),
            length,
        }
    }

    /// EtherType formatted as lowercase hex without prefix or padding
    pub fn ether_type_hex(&self) -> Option<String> {
        self.ether_type.map(|ether_type| format!("{:x}", ether_type))
    }
}

/// Payload classification, one arm per recognized EtherType
#[derive(Debug, Clone, PartialEq)]
pub enum PacketKind {
    /// Unrecognized EtherType; carries an error when the Ethernet header was truncated
    Unknown(Option<DecodeError>),
    Ipv4(Decoded<Ipv4Header>),
    Ipv6(Decoded<Ipv6Header>),
    Arp(Decoded<ArpHeader>),
    /// ICMP placed directly after the Ethernet header (EtherType 0x0001)
    Icmp(Decoded<IcmpHeader>),
}

impl PacketKind {
    /// Label used for packet type statistics
    pub fn label(&self) -> &'static str {
        match self {
            PacketKind::Unknown(_) => "unknown",
            PacketKind::Ipv4(_) => "ipv4",
            PacketKind::Ipv6(_) => "ipv6",
            PacketKind::Arp(_) => "arp",
            PacketKind::Icmp(_) => "icmp",
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, PacketKind::Unknown(_))
    }

    /// First error raised while decoding this kind, nested ICMP headers included
    pub fn error(&self) -> Option<&DecodeError> {
        match self {
            PacketKind::Unknown(error) => error.as_ref(),
            PacketKind::Ipv4(Ok(header)) => nested_error(&header.icmp),
            PacketKind::Ipv6(Ok(header)) => nested_error(&header.icmp),
            PacketKind::Ipv4(Err(e)) | PacketKind::Ipv6(Err(e)) => Some(e),
            PacketKind::Arp(header) => header.as_ref().err(),
            PacketKind::Icmp(header) => header.as_ref().err(),
        }
    }

    /// IPv4 header whenever its fixed part decoded, even if a nested header did not
    pub fn ipv4(&self) -> Option<&Ipv4Header> {
        match self {
            PacketKind::Ipv4(Ok(header)) => Some(header),
            _ => None,
        }
    }

    /// IPv4 header only when nothing in the packet failed to decode
    pub fn ipv4_well_formed(&self) -> Option<&Ipv4Header> {
        match self.error() {
            Some(_) => None,
            None => self.ipv4(),
        }
    }
}

fn nested_error(icmp: &Option<Decoded<IcmpHeader>>) -> Option<&DecodeError> {
    icmp.as_ref().and_then(|header| header.as_ref().err())
}

/// Fixed part of an IPv4 header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ipv4Header {
    pub version: u8,

    /// Header length in bytes (IHL * 4)
    pub header_length: u8,

    pub ttl: u8,
    pub protocol: u8,

    /// Dotted-decimal source address
    pub src_ip: String,

    /// Dotted-decimal destination address
    pub dst_ip: String,

    /// Present when `protocol` is ICMP
    #[serde(skip)]
    pub icmp: Option<Decoded<IcmpHeader>>,
}

/// Fixed 40-byte IPv6 header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ipv6Header {
    pub version: u8,
    pub traffic_class: u8,
    pub flow_label: u32,
    pub payload_length: u16,
    pub next_header: u8,
    pub hop_limit: u8,

    /// Eight colon-separated hex groups, no zero compression
    pub src_ip: String,
    pub dst_ip: String,

    /// Present when `next_header` is ICMPv6
    #[serde(skip)]
    pub icmp: Option<Decoded<IcmpHeader>>,
}

/// Fixed 8-byte ARP header, addresses are not decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArpHeader {
    pub hardware_type: u16,
    pub protocol_type: u16,
    pub hardware_length: u8,
    pub protocol_length: u8,
    pub opcode: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IcmpHeader {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
}
