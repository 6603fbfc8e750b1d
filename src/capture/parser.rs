use log::{debug, log_enabled, trace, Level};
use pnet::packet::{
    ethernet::{EtherType, EtherTypes, EthernetPacket},
    icmp::IcmpPacket,
    ip::IpNextHeaderProtocols,
    ipv4::Ipv4Packet,
    ipv6::Ipv6Packet,
    Packet as PnetPacket,
};
use pnet::util::MacAddr;
use std::net::Ipv6Addr;

use crate::models::packet::{
    ArpHeader, Decoded, IcmpHeader, Ipv4Header, Ipv6Header, Packet, PacketKind,
};
use crate::utils::error::{DecodeError, Layer};

pub const ETHERNET_HEADER_LEN: usize = 14;
pub const IPV4_HEADER_LEN: usize = 20;
pub const IPV6_HEADER_LEN: usize = 40;
pub const ARP_HEADER_LEN: usize = 8;
pub const ICMP_HEADER_LEN: usize = 4;

/// Non-standard EtherType some embedded stacks use for bare ICMP
const ETHERTYPE_BARE_ICMP: EtherType = EtherType(0x0001);

/// Decodes raw link-layer frames into structured packets.
///
/// Decoding never fails as a whole: a header that does not fit in the buffer is replaced by an
/// error marker for that layer while everything decoded before it is kept.
pub struct PacketParser {}

impl PacketParser {
    /// Create a new packet parser
    pub fn new() -> Self {
        Self {}
    }

    /// Parse one frame (capture prefix already stripped)
    pub fn parse_packet(&self, data: &[u8]) -> Packet {
        let eth_packet = match EthernetPacket::new(data) {
            Some(packet) => packet,
            None => {
                let err = DecodeError::truncated(Layer::Ethernet, ETHERNET_HEADER_LEN, data.len());
                debug!("Failed to decode frame: {}", err);
                return Packet::truncated(data.len(), err);
            }
        };

        let ethertype = eth_packet.get_ethertype();
        let payload = eth_packet.payload();

        let kind = match ethertype {
            EtherTypes::Ipv4 => PacketKind::Ipv4(self.parse_ipv4(payload)),
            EtherTypes::Ipv6 => PacketKind::Ipv6(self.parse_ipv6(payload)),
            EtherTypes::Arp => PacketKind::Arp(self.parse_arp(payload)),
            ETHERTYPE_BARE_ICMP => PacketKind::Icmp(self.parse_icmp(payload)),
            _ => PacketKind::Unknown(None),
        };

        if let Some(err) = kind.error() {
            debug!("Failed to decode {} frame: {}", kind.label(), err);
        }

        let packet = Packet {
            src_mac: self.format_mac(eth_packet.get_source()),
            dst_mac: self.format_mac(eth_packet.get_destination()),
            ether_type: Some(ethertype.0),
            kind,
            src_device: String::new(),
            dst_device: String::new(),
            length: data.len(),
        };

        if log_enabled!(Level::Trace) {
            trace!("EtherType: {:#06x} ({}), src: {}, dst: {}",
                   ethertype.0, packet.kind.label(), packet.src_mac, packet.dst_mac);
        }

        packet
    }

    /// Parse the fixed IPv4 header; options are skipped, not parsed
    fn parse_ipv4(&self, data: &[u8]) -> Decoded<Ipv4Header> {
        let ipv4_packet = Ipv4Packet::new(data)
            .ok_or_else(|| DecodeError::truncated(Layer::Ipv4, IPV4_HEADER_LEN, data.len()))?;

        let header_length = ipv4_packet.get_header_length() * 4;
        let protocol = ipv4_packet.get_next_level_protocol();

        // Payload starts after the options, whatever total_length claims
        let icmp = if protocol == IpNextHeaderProtocols::Icmp {
            let payload = data.get(header_length as usize..).unwrap_or(&[]);
            Some(self.parse_icmp(payload))
        } else {
            None
        };

        if log_enabled!(Level::Trace) {
            trace!("IPv4 - src: {}, dst: {}, proto: {}",
                   ipv4_packet.get_source(),
                   ipv4_packet.get_destination(),
                   protocol.0);
        }

        Ok(Ipv4Header {
            version: ipv4_packet.get_version(),
            header_length,
            ttl: ipv4_packet.get_ttl(),
            protocol: protocol.0,
            src_ip: ipv4_packet.get_source().to_string(),
            dst_ip: ipv4_packet.get_destination().to_string(),
            icmp,
        })
    }

    /// Parse the fixed 40-byte IPv6 header; extension headers are not followed
    fn parse_ipv6(&self, data: &[u8]) -> Decoded<Ipv6Header> {
        let ipv6_packet = Ipv6Packet::new(data)
            .ok_or_else(|| DecodeError::truncated(Layer::Ipv6, IPV6_HEADER_LEN, data.len()))?;

        let next_header = ipv6_packet.get_next_header();
        let icmp = if next_header == IpNextHeaderProtocols::Icmpv6 {
            Some(self.parse_icmp(&data[IPV6_HEADER_LEN..]))
        } else {
            None
        };

        Ok(Ipv6Header {
            version: ipv6_packet.get_version(),
            traffic_class: ipv6_packet.get_traffic_class(),
            flow_label: ipv6_packet.get_flow_label(),
            payload_length: ipv6_packet.get_payload_length(),
            next_header: next_header.0,
            hop_limit: ipv6_packet.get_hop_limit(),
            src_ip: self.format_ipv6(ipv6_packet.get_source()),
            dst_ip: self.format_ipv6(ipv6_packet.get_destination()),
            icmp,
        })
    }

    /// Parse the fixed 8-byte ARP header.
    ///
    /// pnet's `ArpPacket` insists on the full 28-byte Ethernet/IPv4 body, so the fixed part is
    /// read by hand to accept any hardware/protocol address sizes.
    fn parse_arp(&self, data: &[u8]) -> Decoded<ArpHeader> {
        let header = data
            .get(..ARP_HEADER_LEN)
            .ok_or_else(|| DecodeError::truncated(Layer::Arp, ARP_HEADER_LEN, data.len()))?;

        Ok(ArpHeader {
            hardware_type: u16::from_be_bytes([header[0], header[1]]),
            protocol_type: u16::from_be_bytes([header[2], header[3]]),
            hardware_length: header[4],
            protocol_length: header[5],
            opcode: u16::from_be_bytes([header[6], header[7]]),
        })
    }

    /// Parse the 4-byte ICMP / ICMPv6 header
    fn parse_icmp(&self, data: &[u8]) -> Decoded<IcmpHeader> {
        let icmp_packet = IcmpPacket::new(data)
            .ok_or_else(|| DecodeError::truncated(Layer::Icmp, ICMP_HEADER_LEN, data.len()))?;

        Ok(IcmpHeader {
            icmp_type: icmp_packet.get_icmp_type().0,
            code: icmp_packet.get_icmp_code().0,
            checksum: icmp_packet.get_checksum(),
        })
    }

    /// Format MAC address to a readable string
    fn format_mac(&self, mac: MacAddr) -> String {
        format!("{}", mac)
    }

    /// Eight hex groups joined by ':', without `::` compression
    fn format_ipv6(&self, addr: Ipv6Addr) -> String {
        addr.segments()
            .iter()
            .map(|group| format!("{:x}", group))
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl Default for PacketParser {
    fn default() -> Self {
        Self::new()
    }
}
