//! Destination side: whoever the delivery loop hands packets to.

use std::sync::mpsc;

use parking_lot::Mutex;

use crate::buffer::Buffer;
use crate::packet::PacketKind;

/// Receiver of delivered RTP and RTCP packets.
///
/// Called from the execution context's loop. Implementations must not block
/// indefinitely; the buffer is only borrowed for the duration of the call.
pub trait MediaReceiver: Send + Sync {
    fn on_packet_received(&self, packet: &Buffer);

    fn on_rtcp_received(&self, packet: &Buffer);
}

/// One delivered packet, owned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub kind: PacketKind,
    pub packet: Buffer,
}

/// In-memory receiver that keeps every delivery in arrival order.
#[derive(Debug, Default)]
pub struct RecordingReceiver {
    deliveries: Mutex<Vec<Delivery>>,
}

impl RecordingReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// All deliveries so far, RTP and RTCP interleaved as they arrived.
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    /// RTP packets in arrival order.
    pub fn rtp_packets(&self) -> Vec<Buffer> {
        self.of_kind(PacketKind::Rtp)
    }

    /// RTCP packets in arrival order.
    pub fn rtcp_packets(&self) -> Vec<Buffer> {
        self.of_kind(PacketKind::Rtcp)
    }

    pub fn len(&self) -> usize {
        self.deliveries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.lock().is_empty()
    }

    fn of_kind(&self, kind: PacketKind) -> Vec<Buffer> {
        self.deliveries
            .lock()
            .iter()
            .filter(|d| d.kind == kind)
            .map(|d| d.packet.clone())
            .collect()
    }

    fn record(&self, kind: PacketKind, packet: &Buffer) {
        self.deliveries.lock().push(Delivery {
            kind,
            packet: packet.clone(),
        });
    }
}

impl MediaReceiver for RecordingReceiver {
    fn on_packet_received(&self, packet: &Buffer) {
        self.record(PacketKind::Rtp, packet);
    }

    fn on_rtcp_received(&self, packet: &Buffer) {
        self.record(PacketKind::Rtcp, packet);
    }
}

/// Receiver that forwards each delivery over an mpsc channel.
///
/// Lets application code consume packets on its own thread. Once the
/// consuming end is dropped, deliveries are discarded.
pub struct ChannelReceiver {
    tx: Mutex<mpsc::Sender<Delivery>>,
}

impl ChannelReceiver {
    /// Create a receiver together with the consuming end of its channel.
    pub fn new() -> (Self, mpsc::Receiver<Delivery>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx: Mutex::new(tx) }, rx)
    }

    fn forward(&self, kind: PacketKind, packet: &Buffer) {
        let delivery = Delivery {
            kind,
            packet: packet.clone(),
        };
        if self.tx.lock().send(delivery).is_err() {
            tracing::trace!(%kind, "channel receiver closed, dropping packet");
        }
    }
}

impl MediaReceiver for ChannelReceiver {
    fn on_packet_received(&self, packet: &Buffer) {
        self.forward(PacketKind::Rtp, packet);
    }

    fn on_rtcp_received(&self, packet: &Buffer) {
        self.forward(PacketKind::Rtcp, packet);
    }
}
