use std::fmt;

/// Packet class, fixed at submission time by the API that was called (or
/// the socket a datagram arrived on). Never derived from packet contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    /// RTP media packet.
    Rtp,
    /// RTCP control packet.
    Rtcp,
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rtp => write!(f, "RTP"),
            Self::Rtcp => write!(f, "RTCP"),
        }
    }
}
