use std::collections::BTreeMap;

use crate::buffer::Buffer;
use crate::packet::PacketKind;
use crate::rtp;

/// Most SSRCs tracked per session. SSRCs come off the wire, so packets from
/// sources beyond this are only counted in [`SessionStats::untracked`].
pub const MAX_SOURCES: usize = 1024;

/// Packet and byte totals for one direction of one stream class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub packets: u64,
    pub bytes: u64,
}

impl Counters {
    fn add(&mut self, len: usize) {
        self.packets += 1;
        self.bytes += len as u64;
    }
}

/// Traffic seen by a [`TransportSession`](super::TransportSession).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub rtp_sent: Counters,
    pub rtcp_sent: Counters,
    pub rtp_received: Counters,
    pub rtcp_received: Counters,
    /// Received RTP packets too short to carry an SSRC.
    pub rtp_truncated: u64,
    /// Received RTP per SSRC, at most [`MAX_SOURCES`] entries.
    pub sources: BTreeMap<u32, Counters>,
    /// Received RTP from SSRCs that did not fit in `sources`.
    pub untracked: u64,
}

impl SessionStats {
    pub(crate) fn record_sent(&mut self, kind: PacketKind, packet: &Buffer) {
        match kind {
            PacketKind::Rtp => self.rtp_sent.add(packet.len()),
            PacketKind::Rtcp => self.rtcp_sent.add(packet.len()),
        }
    }

    /// Returns the packet's SSRC for RTP, when it has one.
    pub(crate) fn record_received(&mut self, kind: PacketKind, packet: &Buffer) -> Option<u32> {
        match kind {
            PacketKind::Rtcp => {
                self.rtcp_received.add(packet.len());
                None
            }
            PacketKind::Rtp => {
                self.rtp_received.add(packet.len());
                let ssrc = rtp::ssrc(packet.data());
                match ssrc {
                    Some(ssrc) if self.sources.len() < MAX_SOURCES => {
                        self.sources.entry(ssrc).or_default().add(packet.len())
                    }
                    Some(ssrc) => match self.sources.get_mut(&ssrc) {
                        Some(counters) => counters.add(packet.len()),
                        None => self.untracked += 1,
                    },
                    None => self.rtp_truncated += 1,
                }
                ssrc
            }
        }
    }
}
