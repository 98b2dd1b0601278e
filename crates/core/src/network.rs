//! Network interface abstraction.
//!
//! A [`NetworkInterface`] is the send side of a transport session. The
//! session hands it finished RTP and RTCP packets; the interface decides how
//! they travel. Two backends ship with the crate:
//!
//! - [`UdpNetworkInterface`](crate::udp::UdpNetworkInterface): real sockets.
//! - [`FakeNetworkInterface`](crate::fake::FakeNetworkInterface): records
//!   packets in memory and loops them to a receiver through an
//!   [`ExecutionContext`](crate::dispatch::ExecutionContext).

use crate::buffer::Buffer;
use crate::error::Result;

/// Which of the session's sockets an option targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketType {
    Rtp,
    Rtcp,
}

/// Transport-level tuning knobs.
///
/// Only the buffer sizes are acted on by the bundled backends. The other
/// kinds exist so callers can try optional tuning without failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketOption {
    /// `SO_SNDBUF`
    SendBufferSize,
    /// `SO_RCVBUF`
    RecvBufferSize,
    DontFragment,
    NoDelay,
    Ipv6Only,
}

/// Send side of a transport session.
///
/// Implementations take the packet by reference and never mutate the
/// caller's buffer; anything they keep or forward is a copy. Sends must not
/// block on delivery to the far end.
pub trait NetworkInterface: Send + Sync {
    /// Send an RTP packet.
    fn send_packet(&self, packet: &Buffer) -> Result<()>;

    /// Send an RTCP packet.
    fn send_rtcp(&self, packet: &Buffer) -> Result<()>;

    /// Apply a socket option. Unrecognized kinds succeed without effect.
    fn set_option(&self, socket: SocketType, option: SocketOption, value: i32) -> Result<()>;
}
