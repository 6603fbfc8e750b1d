use std::collections::HashMap;

use crate::models::packet::Packet;

/// Resolves MAC addresses to configured device names.
///
/// The table is fixed at construction; resolving never mutates anything.
#[derive(Debug, Clone, Default)]
pub struct AddressMapper {
    names: HashMap<String, String>,

    /// Return unknown MACs as-is instead of the caller's default
    pass_through: bool,
}

impl AddressMapper {
    pub fn new(names: HashMap<String, String>) -> Self {
        // Decoded MACs are lowercase, config files are not always
        let names = names
            .into_iter()
            .map(|(mac, name)| (mac.to_lowercase(), name))
            .collect();

        Self {
            names,
            pass_through: false,
        }
    }

    pub fn with_pass_through(mut self, pass_through: bool) -> Self {
        self.pass_through = pass_through;
        self
    }

    /// Device name for `mac`, falling back to the MAC itself or `default`
    pub fn resolve(&self, mac: &str, default: &str) -> String {
        match self.names.get(mac) {
            Some(name) => name.clone(),
            None if self.pass_through => mac.to_string(),
            None => default.to_string(),
        }
    }

    /// Fill in both device names of a decoded packet
    pub fn annotate(&self, packet: &mut Packet, default: &str) {
        packet.src_device = self.resolve(&packet.src_mac, default);
        packet.dst_device = self.resolve(&packet.dst_mac, default);
    }

    /// Number of known devices
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::parser::PacketParser;

    fn mapper() -> AddressMapper {
        let mut names = HashMap::new();
        names.insert("AA:BB:CC:DD:EE:01".to_string(), "phone".to_string());
        names.insert("aa:bb:cc:dd:ee:02".to_string(), "laptop".to_string());
        AddressMapper::new(names)
    }

    #[test]
    fn resolves_known_and_unknown() {
        let mapper = mapper();
        assert_eq!(mapper.len(), 2);
        assert_eq!(mapper.resolve("aa:bb:cc:dd:ee:01", ""), "phone");
        assert_eq!(mapper.resolve("aa:bb:cc:dd:ee:02", ""), "laptop");
        assert_eq!(mapper.resolve("aa:bb:cc:dd:ee:03", ""), "");
        assert_eq!(mapper.resolve("aa:bb:cc:dd:ee:03", "?"), "?");
    }

    #[test]
    fn pass_through_returns_mac() {
        let mapper = mapper().with_pass_through(true);
        assert_eq!(mapper.resolve("aa:bb:cc:dd:ee:03", ""), "aa:bb:cc:dd:ee:03");
        assert_eq!(mapper.resolve("aa:bb:cc:dd:ee:02", ""), "laptop");
    }

    #[test]
    fn resolve_is_idempotent() {
        let mapper = mapper();
        let first = mapper.resolve("aa:bb:cc:dd:ee:01", "");
        for _ in 0..3 {
            assert_eq!(mapper.resolve("aa:bb:cc:dd:ee:01", ""), first);
        }
        assert_eq!(mapper.len(), 2);
    }

    #[test]
    fn annotates_packet() {
        let mut frame = vec![0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x02];
        frame.extend_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01]);
        frame.extend_from_slice(&[0x08, 0x06]);

        let mut packet = PacketParser::new().parse_packet(&frame);
        mapper().annotate(&mut packet, "");
        assert_eq!(packet.src_device, "phone");
        assert_eq!(packet.dst_device, "laptop");
    }
}
