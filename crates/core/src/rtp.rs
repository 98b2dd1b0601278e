//! RTP fixed-header helpers (RFC 3550 §5.1).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           Timestamp                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                             SSRC                              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The transport treats payloads as opaque. The only field it touches is
//! the SSRC at [`SSRC_OFFSET`], which conference fan-out rewrites.

use crate::buffer::Buffer;

/// Byte offset of the SSRC field in an RTP packet.
pub const SSRC_OFFSET: usize = 8;

/// Length of the RTP fixed header without CSRCs or extensions.
pub const RTP_HEADER_LEN: usize = 12;

/// SSRC of an RTP packet, if the packet is long enough to carry one.
pub fn ssrc(packet: &[u8]) -> Option<u32> {
    let field = packet.get(SSRC_OFFSET..SSRC_OFFSET + 4)?;
    Some(u32::from_be_bytes([field[0], field[1], field[2], field[3]]))
}

/// Sequence number of an RTP packet.
pub fn sequence(packet: &[u8]) -> Option<u16> {
    let field = packet.get(2..4)?;
    Some(u16::from_be_bytes([field[0], field[1]]))
}

/// Whether a packet on an RTP/RTCP-multiplexed port is RTCP.
///
/// RFC 5761 §4: the second byte of RTCP falls in `192..=223`
/// (RTCP packet types 200-204 with the RTP marker bit position set).
pub fn is_rtcp(packet: &[u8]) -> bool {
    matches!(packet.get(1), Some(192..=223))
}

/// Stateful RTP header writer for one outgoing stream.
///
/// Version is always 2; padding, extension and CSRC count are 0. The
/// sequence number wraps at 16 bits and advances on every
/// [`write`](Self::write). The timestamp only moves when
/// [`advance_timestamp`](Self::advance_timestamp) is called.
#[derive(Debug)]
pub struct RtpHeader {
    /// RTP payload type (7-bit, RFC 3551).
    pub pt: u8,
    /// Synchronization source identifier.
    pub ssrc: u32,
    sequence: u16,
    timestamp: u32,
}

impl RtpHeader {
    pub fn new(pt: u8, ssrc: u32) -> Self {
        tracing::debug!(
            pt,
            ssrc = format_args!("{:#010X}", ssrc),
            "RTP stream created"
        );
        Self {
            pt: pt & 0x7F,
            ssrc,
            sequence: 0,
            timestamp: 0,
        }
    }

    /// Random SSRC per RFC 3550 §8.1.
    pub fn with_random_ssrc(pt: u8) -> Self {
        Self::new(pt, rand::random::<u32>())
    }

    /// Sequence number the next packet will carry.
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Serialize the 12-byte fixed header and advance the sequence number.
    pub fn write(&mut self, marker: bool) -> [u8; RTP_HEADER_LEN] {
        let mut header = [0u8; RTP_HEADER_LEN];
        header[0] = 2 << 6;
        header[1] = ((marker as u8) << 7) | self.pt;
        header[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        header[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        header[SSRC_OFFSET..RTP_HEADER_LEN].copy_from_slice(&self.ssrc.to_be_bytes());

        self.sequence = self.sequence.wrapping_add(1);
        header
    }

    /// Build a complete packet: fixed header followed by `payload`.
    pub fn packet(&mut self, marker: bool, payload: &[u8]) -> Buffer {
        let mut buf = Buffer::with_capacity(RTP_HEADER_LEN + payload.len());
        buf.append(&self.write(marker));
        buf.append(payload);
        buf
    }

    pub fn advance_timestamp(&mut self, increment: u32) {
        self.timestamp = self.timestamp.wrapping_add(increment);
    }
}
