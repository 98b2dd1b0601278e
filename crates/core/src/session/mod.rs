//! Packet transport session.
//!
//! A [`TransportSession`] is one logical media channel: it sends RTP and
//! RTCP through whichever [`NetworkInterface`] is attached and acts as the
//! [`MediaReceiver`] for inbound packets. The interface can be swapped at
//! any time, so the same session runs over real sockets in production and
//! over a [`FakeNetworkInterface`](crate::FakeNetworkInterface) in tests.
//!
//! ```text
//! session A ──send_rtp──▶ interface ──post──▶ ExecutionContext
//!                                                 │ drain
//!                                                 ▼
//!                                   session B.on_packet_received
//! ```
//!
//! Received RTP is counted per SSRC, which makes conference fan-out
//! visible as several sources on the receiving session.

pub mod stats;

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::buffer::Buffer;
use crate::error::{Result, TransportError};
use crate::network::{NetworkInterface, SocketOption, SocketType};
use crate::packet::PacketKind;
use crate::receiver::MediaReceiver;
pub use stats::{Counters, MAX_SOURCES, SessionStats};

/// RTP/RTCP session over a pluggable network interface.
#[derive(Default)]
pub struct TransportSession {
    interface: RwLock<Option<Arc<dyn NetworkInterface>>>,
    sink: RwLock<Option<Arc<dyn MediaReceiver>>>,
    stats: Mutex<SessionStats>,
}

impl TransportSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interface(interface: Arc<dyn NetworkInterface>) -> Self {
        let session = Self::new();
        session.set_interface(Some(interface));
        session
    }

    /// Attach or detach the network interface used for sending.
    pub fn set_interface(&self, interface: Option<Arc<dyn NetworkInterface>>) {
        tracing::debug!(attached = interface.is_some(), "network interface changed");
        *self.interface.write() = interface;
    }

    pub fn has_interface(&self) -> bool {
        self.interface.read().is_some()
    }

    /// Application-side receiver for packets this session receives.
    pub fn set_sink(&self, sink: Option<Arc<dyn MediaReceiver>>) {
        *self.sink.write() = sink;
    }

    pub fn send_rtp(&self, packet: &Buffer) -> Result<()> {
        self.send(PacketKind::Rtp, packet)
    }

    pub fn send_rtcp(&self, packet: &Buffer) -> Result<()> {
        self.send(PacketKind::Rtcp, packet)
    }

    pub fn set_option(&self, socket: SocketType, option: SocketOption, value: i32) -> Result<()> {
        self.interface()?.set_option(socket, option, value)
    }

    /// Snapshot of the traffic counters.
    pub fn stats(&self) -> SessionStats {
        self.stats.lock().clone()
    }

    /// SSRCs seen on received RTP, ascending, capped at [`MAX_SOURCES`].
    pub fn sources(&self) -> Vec<u32> {
        self.stats.lock().sources.keys().copied().collect()
    }

    /// Number of RTP packets received from `ssrc`.
    pub fn packets_from(&self, ssrc: u32) -> u64 {
        self.stats
            .lock()
            .sources
            .get(&ssrc)
            .map_or(0, |c| c.packets)
    }

    fn interface(&self) -> Result<Arc<dyn NetworkInterface>> {
        self.interface
            .read()
            .clone()
            .ok_or(TransportError::InterfaceNotSet)
    }

    fn send(&self, kind: PacketKind, packet: &Buffer) -> Result<()> {
        let interface = self.interface()?;
        match kind {
            PacketKind::Rtp => interface.send_packet(packet)?,
            PacketKind::Rtcp => interface.send_rtcp(packet)?,
        }
        self.stats.lock().record_sent(kind, packet);
        Ok(())
    }

    fn receive(&self, kind: PacketKind, packet: &Buffer) {
        let ssrc = self.stats.lock().record_received(kind, packet);
        tracing::trace!(
            %kind,
            len = packet.len(),
            ssrc = format_args!("{:#010X}", ssrc.unwrap_or_default()),
            "packet received"
        );

        let sink = self.sink.read().clone();
        if let Some(sink) = sink {
            match kind {
                PacketKind::Rtp => sink.on_packet_received(packet),
                PacketKind::Rtcp => sink.on_rtcp_received(packet),
            }
        }
    }
}

impl MediaReceiver for TransportSession {
    fn on_packet_received(&self, packet: &Buffer) {
        self.receive(PacketKind::Rtp, packet);
    }

    fn on_rtcp_received(&self, packet: &Buffer) {
        self.receive(PacketKind::Rtcp, packet);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeNetworkInterface;
    use crate::receiver::RecordingReceiver;
    use crate::rtp::RtpHeader;

    #[test]
    fn send_without_interface_fails() {
        let session = TransportSession::new();
        assert!(!session.has_interface());
        let err = session.send_rtp(&Buffer::from_slice(&[0; 12])).unwrap_err();
        assert!(matches!(err, TransportError::InterfaceNotSet));
        assert!(
            session
                .set_option(SocketType::Rtp, SocketOption::SendBufferSize, 1)
                .is_err()
        );
        assert_eq!(session.stats(), SessionStats::default());
    }

    #[test]
    fn sends_go_through_interface() {
        let iface = Arc::new(FakeNetworkInterface::default());
        let session = TransportSession::with_interface(iface.clone());
        let mut header = RtpHeader::new(0, 42);

        session.send_rtp(&header.packet(false, &[0; 160])).unwrap();
        session.send_rtcp(&Buffer::from_slice(&[0x80, 0xC9, 0, 1, 0, 0, 0, 42])).unwrap();
        session
            .set_option(SocketType::Rtp, SocketOption::RecvBufferSize, 1024)
            .unwrap();

        assert_eq!(iface.num_rtp_packets(), 1);
        assert_eq!(iface.num_rtcp_packets(), 1);
        assert_eq!(iface.recvbuf_size(), 1024);

        let stats = session.stats();
        assert_eq!(stats.rtp_sent, Counters { packets: 1, bytes: 172 });
        assert_eq!(stats.rtcp_sent.packets, 1);
    }

    #[test]
    fn received_packets_reach_sink_and_stats() {
        let session = TransportSession::new();
        let sink = Arc::new(RecordingReceiver::new());
        session.set_sink(Some(sink.clone()));

        let mut a = RtpHeader::new(0, 0x10);
        let mut b = RtpHeader::new(0, 0x20);
        session.on_packet_received(&a.packet(false, &[1]));
        session.on_packet_received(&b.packet(false, &[2]));
        session.on_packet_received(&a.packet(false, &[3]));
        session.on_rtcp_received(&Buffer::from_slice(&[0; 8]));

        assert_eq!(session.sources(), vec![0x10, 0x20]);
        assert_eq!(session.packets_from(0x10), 2);
        assert_eq!(session.packets_from(0x30), 0);
        assert_eq!(session.stats().rtcp_received.packets, 1);
        assert_eq!(sink.rtp_packets().len(), 3);
        assert_eq!(sink.rtcp_packets().len(), 1);
    }

    #[test]
    fn detaching_interface_stops_sending() {
        let iface = Arc::new(FakeNetworkInterface::default());
        let session = TransportSession::with_interface(iface.clone());
        session.send_rtp(&Buffer::from_slice(&[0; 12])).unwrap();
        session.set_interface(None);
        assert!(session.send_rtp(&Buffer::from_slice(&[0; 12])).is_err());
        assert_eq!(iface.num_rtp_packets(), 1);
    }
}
