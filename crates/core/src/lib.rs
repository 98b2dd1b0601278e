//! RTP/RTCP packet transport session with pluggable delivery backends.
//!
//! - [`TransportSession`] sends through a [`NetworkInterface`] and receives
//!   as a [`MediaReceiver`].
//! - [`UdpNetworkInterface`] carries packets over real sockets.
//! - [`FakeNetworkInterface`] records packets in memory and loops them back
//!   through an [`ExecutionContext`], optionally fanning RTP out under
//!   synthetic SSRCs to emulate a conference.

pub mod buffer;
pub mod conference;
pub mod dispatch;
pub mod error;
pub mod fake;
pub mod network;
pub mod options;
pub mod packet;
pub mod receiver;
pub mod recorder;
pub mod rtp;
pub mod session;
pub mod udp;

pub use buffer::Buffer;
pub use conference::ConferenceMode;
pub use dispatch::{ContextThread, ExecutionContext, Message, MessageHandler};
pub use error::{Result, TransportError};
pub use fake::FakeNetworkInterface;
pub use network::{NetworkInterface, SocketOption, SocketType};
pub use packet::PacketKind;
pub use receiver::{ChannelReceiver, Delivery, MediaReceiver, RecordingReceiver};
pub use session::{SessionStats, TransportSession};
pub use udp::{UdpConfig, UdpNetworkInterface, UdpReceiver};
