//! In-memory network interface for tests.
//!
//! [`FakeNetworkInterface`] never touches a socket. Every sent packet is
//! captured, then looped back to a configured destination through an
//! [`ExecutionContext`], optionally fanned out under synthetic SSRCs (see
//! [`ConferenceMode`]).
//!
//! ```
//! use std::sync::Arc;
//! use rtp_transport::{Buffer, FakeNetworkInterface, NetworkInterface, RecordingReceiver};
//!
//! let iface = FakeNetworkInterface::default();
//! let dest = Arc::new(RecordingReceiver::new());
//! iface.set_destination(Some(dest.clone()));
//!
//! let packet = Buffer::from_slice(&[0x80, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1]);
//! iface.send_packet(&packet).unwrap();
//! assert!(dest.is_empty());
//!
//! iface.context().process_pending();
//! assert_eq!(dest.rtp_packets(), vec![packet]);
//! ```

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::buffer::Buffer;
use crate::conference::ConferenceMode;
use crate::dispatch::{ExecutionContext, Message, MessageHandler};
use crate::error::Result;
use crate::network::{NetworkInterface, SocketOption, SocketType};
use crate::options::SocketOptions;
use crate::packet::PacketKind;
use crate::receiver::MediaReceiver;
use crate::recorder::PacketRecorder;

/// State guarded by one lock: the capture logs and the conference policy.
#[derive(Default)]
struct Shared {
    recorder: PacketRecorder,
    conference: ConferenceMode,
}

struct Inner {
    state: Mutex<Shared>,
    destination: RwLock<Option<Arc<dyn MediaReceiver>>>,
    options: Mutex<SocketOptions>,
}

impl MessageHandler for Inner {
    fn on_message(&self, message: Message) {
        let Some(dest) = self.destination.read().clone() else {
            tracing::trace!(kind = %message.kind, len = message.data.len(), "no destination, packet dropped");
            return;
        };
        match message.kind {
            PacketKind::Rtp => dest.on_packet_received(&message.data),
            PacketKind::Rtcp => dest.on_rtcp_received(&message.data),
        }
    }
}

/// Network interface that records packets and loops them back in memory.
///
/// Sends never fail and never deliver synchronously: deliveries happen when
/// the execution context is drained. Capture logs count every accepted send
/// whether or not a destination is set.
pub struct FakeNetworkInterface {
    inner: Arc<Inner>,
    handler: Weak<dyn MessageHandler>,
    context: ExecutionContext,
}

impl FakeNetworkInterface {
    /// Create an interface that delivers on `context`.
    pub fn new(context: ExecutionContext) -> Self {
        let inner = Arc::new(Inner {
            state: Mutex::new(Shared::default()),
            destination: RwLock::new(None),
            options: Mutex::new(SocketOptions::default()),
        });
        let handler: Weak<dyn MessageHandler> = Arc::downgrade(&inner) as Weak<dyn MessageHandler>;
        Self {
            inner,
            handler,
            context,
        }
    }

    /// Execution context deliveries are posted to.
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Receiver for looped-back packets. `None` drops them after capture.
    pub fn set_destination(&self, dest: Option<Arc<dyn MediaReceiver>>) {
        tracing::debug!(set = dest.is_some(), "destination changed");
        *self.inner.destination.write() = dest;
    }

    /// Switch between direct delivery and fan-out over `ssrcs`.
    pub fn set_conference_mode(&self, enabled: bool, ssrcs: &[u32]) {
        self.inner.state.lock().conference.set(enabled, ssrcs);
    }

    pub fn conference_mode(&self) -> ConferenceMode {
        self.inner.state.lock().conference.clone()
    }

    pub fn num_rtp_packets(&self) -> usize {
        self.inner.state.lock().recorder.rtp.len()
    }

    pub fn num_rtp_bytes(&self) -> usize {
        self.inner.state.lock().recorder.rtp.total_bytes()
    }

    /// Copy of the `index`-th sent RTP packet.
    pub fn rtp_packet(&self, index: usize) -> Option<Buffer> {
        self.inner.state.lock().recorder.rtp.get(index)
    }

    pub fn rtp_packets(&self) -> Vec<Buffer> {
        self.inner.state.lock().recorder.rtp.snapshot()
    }

    pub fn num_rtcp_packets(&self) -> usize {
        self.inner.state.lock().recorder.rtcp.len()
    }

    pub fn num_rtcp_bytes(&self) -> usize {
        self.inner.state.lock().recorder.rtcp.total_bytes()
    }

    /// Copy of the `index`-th sent RTCP packet.
    pub fn rtcp_packet(&self, index: usize) -> Option<Buffer> {
        self.inner.state.lock().recorder.rtcp.get(index)
    }

    pub fn rtcp_packets(&self) -> Vec<Buffer> {
        self.inner.state.lock().recorder.rtcp.snapshot()
    }

    /// Last `SO_SNDBUF` value set, or [`UNSET`](crate::options::UNSET).
    pub fn sendbuf_size(&self) -> i32 {
        self.inner.options.lock().send_buffer_size
    }

    /// Last `SO_RCVBUF` value set, or [`UNSET`](crate::options::UNSET).
    pub fn recvbuf_size(&self) -> i32 {
        self.inner.options.lock().recv_buffer_size
    }

    fn post(&self, kind: PacketKind, data: Buffer) {
        self.context.post(self.handler.clone(), Message::new(kind, data));
    }
}

impl Default for FakeNetworkInterface {
    fn default() -> Self {
        Self::new(ExecutionContext::new())
    }
}

impl NetworkInterface for FakeNetworkInterface {
    fn send_packet(&self, packet: &Buffer) -> Result<()> {
        let deliveries = {
            let mut state = self.inner.state.lock();
            state.recorder.record(PacketKind::Rtp, packet);
            state.conference.fan_out_rtp(packet)
        };

        match deliveries {
            Ok(copies) => {
                tracing::trace!(len = packet.len(), copies = copies.len(), "RTP captured");
                for copy in copies {
                    self.post(PacketKind::Rtp, copy);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "RTP packet too short for fan-out, not delivered");
            }
        }
        Ok(())
    }

    fn send_rtcp(&self, packet: &Buffer) -> Result<()> {
        let delivery = {
            let mut state = self.inner.state.lock();
            state.recorder.record(PacketKind::Rtcp, packet);
            state.conference.deliver_rtcp(packet)
        };

        tracing::trace!(len = packet.len(), delivered = delivery.is_some(), "RTCP captured");
        if let Some(copy) = delivery {
            self.post(PacketKind::Rtcp, copy);
        }
        Ok(())
    }

    fn set_option(&self, socket: SocketType, option: SocketOption, value: i32) -> Result<()> {
        if self.inner.options.lock().apply(option, value) {
            tracing::debug!(?socket, ?option, value, "socket option recorded");
        }
        Ok(())
    }
}

impl Drop for FakeNetworkInterface {
    fn drop(&mut self) {
        let discarded = self.context.clear(&self.handler);
        if discarded > 0 {
            tracing::debug!(discarded, "undelivered packets discarded on teardown");
        }
    }
}
