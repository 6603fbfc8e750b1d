use log::{info, trace, warn};
use pcap::{Activated, Capture};
use std::path::Path;

use crate::utils::error::AppResult;

/// Snapshot length for live captures
const SNAPLEN: i32 = 65535;

/// Read timeout for live captures, in milliseconds
const READ_TIMEOUT_MS: i32 = 1000;

/// Result of polling a capture source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextFrame {
    /// One raw buffer, capture prefix still attached
    Data(Vec<u8>),
    /// Nothing available right now
    Idle,
    /// The source is exhausted and will not produce more frames
    Closed,
}

/// Anything that yields raw link-layer buffers
pub trait CaptureSource: Send {
    fn next_frame(&mut self) -> AppResult<NextFrame>;
}

/// Live interface or pcap file read through libpcap
pub struct PcapSource {
    capture: Capture<dyn Activated>,
}

impl PcapSource {
    /// Open `interface` for live capture, applying `filter` when given
    pub fn open_live(interface: &str, promiscuous: bool, filter: Option<&str>) -> AppResult<Self> {
        info!("Opening {} (promiscuous: {})", interface, promiscuous);
        let capture = Capture::from_device(interface)?
            .promisc(promiscuous)
            .snaplen(SNAPLEN)
            .timeout(READ_TIMEOUT_MS)
            .open()?;

        Self::with_filter(capture.into(), filter)
    }

    /// Replay frames from a pcap file
    pub fn open_file(path: &Path, filter: Option<&str>) -> AppResult<Self> {
        info!("Reading frames from {}", path.display());
        let capture = Capture::from_file(path)?;
        Self::with_filter(capture.into(), filter)
    }

    fn with_filter(mut capture: Capture<dyn Activated>, filter: Option<&str>) -> AppResult<Self> {
        if let Some(filter) = filter {
            info!("Applying filter: {}", filter);
            capture.filter(filter, true)?;
        }
        Ok(Self { capture })
    }
}

impl CaptureSource for PcapSource {
    fn next_frame(&mut self) -> AppResult<NextFrame> {
        match self.capture.next_packet() {
            Ok(packet) => {
                if packet.header.caplen as usize != packet.data.len() {
                    warn!(
                        "Packet length mismatch: header says {} but data is {} bytes",
                        packet.header.caplen,
                        packet.data.len()
                    );
                }
                Ok(NextFrame::Data(packet.data.to_vec()))
            }
            Err(pcap::Error::TimeoutExpired) => {
                trace!("Packet capture timed out, continuing");
                Ok(NextFrame::Idle)
            }
            Err(pcap::Error::NoMorePackets) => Ok(NextFrame::Closed),
            Err(e) => Err(e.into()),
        }
    }
}

/// Frame contents after the capture prefix, or `None` if the buffer is no longer than the prefix
pub fn strip_prefix(raw: &[u8], prefix_len: usize) -> Option<&[u8]> {
    match raw.get(prefix_len..) {
        Some(frame) if !frame.is_empty() => Some(frame),
        _ => None,
    }
}
