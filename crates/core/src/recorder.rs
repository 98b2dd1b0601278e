//! Capture logs of sent packets.
//!
//! Append-only; lookups hand out owned copies so callers can neither
//! corrupt the log nor be affected by later appends.

use crate::buffer::Buffer;
use crate::packet::PacketKind;

/// Ordered record of captured packets of one class.
#[derive(Debug, Clone, Default)]
pub struct CaptureLog {
    packets: Vec<Buffer>,
    total_bytes: usize,
}

impl CaptureLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a copy of `packet`.
    pub fn push(&mut self, packet: &Buffer) {
        self.total_bytes += packet.len();
        self.packets.push(packet.clone());
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Sum of the lengths of all captured packets.
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Copy of the packet at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<Buffer> {
        self.packets.get(index).cloned()
    }

    /// Copies of every captured packet, oldest first.
    pub fn snapshot(&self) -> Vec<Buffer> {
        self.packets.clone()
    }
}

/// RTP and RTCP capture logs side by side.
#[derive(Debug, Clone, Default)]
pub struct PacketRecorder {
    pub rtp: CaptureLog,
    pub rtcp: CaptureLog,
}

impl PacketRecorder {
    pub fn log(&self, kind: PacketKind) -> &CaptureLog {
        match kind {
            PacketKind::Rtp => &self.rtp,
            PacketKind::Rtcp => &self.rtcp,
        }
    }

    pub fn record(&mut self, kind: PacketKind, packet: &Buffer) {
        match kind {
            PacketKind::Rtp => self.rtp.push(packet),
            PacketKind::Rtcp => self.rtcp.push(packet),
        }
    }
}
