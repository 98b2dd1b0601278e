//! Socket-backed network interface.
//!
//! [`UdpNetworkInterface`] sends RTP and RTCP as UDP datagrams, on two
//! sockets (RTCP on the next port, RFC 3550 §11) or on one socket when
//! RTCP-mux is enabled. Inbound datagrams are read on background threads
//! and handed to an [`ExecutionContext`], whose loop delivers them to a
//! [`MediaReceiver`] exactly like the in-memory interface does.
//!
//! Packet class is taken from the socket a datagram arrived on. A muxed
//! socket is the one exception: there each datagram is classified by its
//! second byte (RFC 5761 §4, see [`rtp::is_rtcp`]).

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use socket2::{Domain, Protocol, SockRef, Socket, Type};

use crate::buffer::Buffer;
use crate::dispatch::{ExecutionContext, Message, MessageHandler};
use crate::error::{Result, TransportError};
use crate::network::{NetworkInterface, SocketOption, SocketType};
use crate::options::SocketOptions;
use crate::packet::PacketKind;
use crate::receiver::MediaReceiver;
use crate::rtp;

/// Largest datagram the readers accept.
const MAX_DATAGRAM: usize = 65_535;

/// Socket backend configuration.
#[derive(Debug, Clone)]
pub struct UdpConfig {
    /// Local RTP address. Port 0 picks an ephemeral port; otherwise RTCP
    /// binds `port + 1`, so port 65535 is rejected unless muxing.
    pub bind_addr: SocketAddr,
    /// Where RTP is sent.
    pub remote_rtp: Option<SocketAddr>,
    /// Where RTCP is sent when not multiplexed.
    pub remote_rtcp: Option<SocketAddr>,
    /// Carry RTCP on the RTP socket (RFC 5761).
    pub rtcp_mux: bool,
    /// Initial `SO_SNDBUF` for every socket.
    pub send_buffer_size: Option<usize>,
    /// Initial `SO_RCVBUF` for every socket.
    pub recv_buffer_size: Option<usize>,
    /// Reader poll interval. Must be non-zero.
    pub read_timeout: Duration,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
            remote_rtp: None,
            remote_rtcp: None,
            rtcp_mux: false,
            send_buffer_size: None,
            recv_buffer_size: None,
            read_timeout: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Remote {
    rtp: Option<SocketAddr>,
    rtcp: Option<SocketAddr>,
}

/// Network interface sending over UDP sockets.
pub struct UdpNetworkInterface {
    rtp: Arc<UdpSocket>,
    rtcp: Option<Arc<UdpSocket>>,
    remote: RwLock<Remote>,
    options: Mutex<SocketOptions>,
    config: UdpConfig,
}

impl UdpNetworkInterface {
    /// Bind the RTP socket and, unless muxing, the RTCP socket.
    pub fn bind(config: UdpConfig) -> Result<Self> {
        let rtcp_addr = if config.rtcp_mux {
            None
        } else {
            Some(rtcp_bind_addr(config.bind_addr)?)
        };
        let rtp = bind_socket(config.bind_addr, &config)?;
        let rtcp = match rtcp_addr {
            Some(addr) => Some(Arc::new(bind_socket(addr, &config)?)),
            None => None,
        };

        let mut options = SocketOptions::default();
        if let Some(size) = config.send_buffer_size {
            options.apply(SocketOption::SendBufferSize, clamp_size(size));
        }
        if let Some(size) = config.recv_buffer_size {
            options.apply(SocketOption::RecvBufferSize, clamp_size(size));
        }

        let iface = Self {
            rtp: Arc::new(rtp),
            rtcp,
            remote: RwLock::new(Remote {
                rtp: config.remote_rtp,
                rtcp: config.remote_rtcp,
            }),
            options: Mutex::new(options),
            config,
        };
        let local = iface.local_rtp_addr()?;
        tracing::info!(rtp = %local, rtcp_mux = iface.config.rtcp_mux, "UDP transport bound");
        Ok(iface)
    }

    pub fn config(&self) -> &UdpConfig {
        &self.config
    }

    pub fn local_rtp_addr(&self) -> Result<SocketAddr> {
        Ok(self.rtp.local_addr()?)
    }

    /// Local RTCP address; equals the RTP address under RTCP-mux.
    pub fn local_rtcp_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket(SocketType::Rtcp).local_addr()?)
    }

    /// Point the interface at a new peer.
    pub fn set_remote(&self, rtp: Option<SocketAddr>, rtcp: Option<SocketAddr>) {
        tracing::debug!(?rtp, ?rtcp, "remote address changed");
        *self.remote.write() = Remote { rtp, rtcp };
    }

    /// Last `SO_SNDBUF` value applied, or [`UNSET`](crate::options::UNSET).
    pub fn sendbuf_size(&self) -> i32 {
        self.options.lock().send_buffer_size
    }

    /// Last `SO_RCVBUF` value applied, or [`UNSET`](crate::options::UNSET).
    pub fn recvbuf_size(&self) -> i32 {
        self.options.lock().recv_buffer_size
    }

    /// Start reading inbound datagrams and deliver them to `destination`
    /// through `context`.
    ///
    /// Readers post without back-pressure. Keep a loop draining `context`
    /// (see [`ExecutionContext::spawn`]) while the receiver runs, or queued
    /// datagrams pile up in memory.
    pub fn start(
        &self,
        context: &ExecutionContext,
        destination: Arc<dyn MediaReceiver>,
    ) -> Result<UdpReceiver> {
        let bridge: Arc<dyn MessageHandler> = Arc::new(Bridge { destination });
        let handler = Arc::downgrade(&bridge);
        // Dropped on error, which stops readers already spawned.
        let mut receiver = UdpReceiver {
            context: context.clone(),
            bridge,
            running: Arc::new(AtomicBool::new(true)),
            readers: Vec::with_capacity(2),
        };

        let mut sockets = vec![(self.rtp.clone(), PacketKind::Rtp)];
        if let Some(rtcp) = &self.rtcp {
            sockets.push((rtcp.clone(), PacketKind::Rtcp));
        }
        let mux = self.config.rtcp_mux;
        for (socket, kind) in sockets {
            let reader = spawn_reader(
                socket,
                kind,
                mux,
                context.clone(),
                handler.clone(),
                receiver.running.clone(),
            )?;
            receiver.readers.push(reader);
        }

        tracing::debug!(readers = receiver.readers.len(), "UDP receive started");
        Ok(receiver)
    }

    fn socket(&self, socket: SocketType) -> &UdpSocket {
        match (socket, &self.rtcp) {
            (SocketType::Rtcp, Some(rtcp)) => rtcp.as_ref(),
            _ => self.rtp.as_ref(),
        }
    }

    fn send(&self, kind: PacketKind, packet: &Buffer) -> Result<()> {
        let remote = *self.remote.read();
        let (socket, addr) = match kind {
            PacketKind::Rtp => (SocketType::Rtp, remote.rtp),
            PacketKind::Rtcp if self.config.rtcp_mux => (SocketType::Rtcp, remote.rtp),
            PacketKind::Rtcp => (SocketType::Rtcp, remote.rtcp),
        };
        let addr = addr.ok_or(TransportError::NoRemoteAddress(kind))?;

        let sent = self.socket(socket).send_to(packet.data(), addr)?;
        if sent != packet.len() {
            return Err(TransportError::PartialSend {
                sent,
                expected: packet.len(),
            });
        }
        tracing::trace!(%kind, %addr, len = sent, "datagram sent");
        Ok(())
    }
}

impl NetworkInterface for UdpNetworkInterface {
    fn send_packet(&self, packet: &Buffer) -> Result<()> {
        self.send(PacketKind::Rtp, packet)
    }

    fn send_rtcp(&self, packet: &Buffer) -> Result<()> {
        self.send(PacketKind::Rtcp, packet)
    }

    fn set_option(&self, socket: SocketType, option: SocketOption, value: i32) -> Result<()> {
        let sock = SockRef::from(self.socket(socket));
        match option {
            SocketOption::SendBufferSize => sock.set_send_buffer_size(buffer_size(value)?)?,
            SocketOption::RecvBufferSize => sock.set_recv_buffer_size(buffer_size(value)?)?,
            _ => {}
        }
        if self.options.lock().apply(option, value) {
            tracing::debug!(?socket, ?option, value, "socket option applied");
        }
        Ok(())
    }
}

/// Running inbound readers of a [`UdpNetworkInterface`].
///
/// Dropping it stops the readers and discards their undelivered packets.
pub struct UdpReceiver {
    context: ExecutionContext,
    bridge: Arc<dyn MessageHandler>,
    running: Arc<AtomicBool>,
    readers: Vec<JoinHandle<()>>,
}

impl UdpReceiver {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the readers and wait for them to exit. Packets already posted
    /// stay queued.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        for reader in self.readers.drain(..) {
            if reader.join().is_err() {
                tracing::warn!("UDP reader panicked");
            }
        }
    }
}

impl Drop for UdpReceiver {
    fn drop(&mut self) {
        self.stop();
        self.context.clear(&Arc::downgrade(&self.bridge));
    }
}

/// Hands posted datagrams to the destination by class.
struct Bridge {
    destination: Arc<dyn MediaReceiver>,
}

impl MessageHandler for Bridge {
    fn on_message(&self, message: Message) {
        match message.kind {
            PacketKind::Rtp => self.destination.on_packet_received(&message.data),
            PacketKind::Rtcp => self.destination.on_rtcp_received(&message.data),
        }
    }
}

/// RTCP binds the port after RTP unless the port is ephemeral.
fn rtcp_bind_addr(mut addr: SocketAddr) -> Result<SocketAddr> {
    if addr.port() != 0 {
        let port = addr.port().checked_add(1).ok_or_else(|| {
            TransportError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "no port above the RTP port for RTCP",
            ))
        })?;
        addr.set_port(port);
    }
    Ok(addr)
}

fn bind_socket(addr: SocketAddr, config: &UdpConfig) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    if let Some(size) = config.send_buffer_size {
        socket.set_send_buffer_size(size)?;
    }
    if let Some(size) = config.recv_buffer_size {
        socket.set_recv_buffer_size(size)?;
    }
    socket.bind(&addr.into())?;
    socket.set_read_timeout(Some(config.read_timeout))?;
    Ok(socket.into())
}

fn spawn_reader(
    socket: Arc<UdpSocket>,
    kind: PacketKind,
    mux: bool,
    context: ExecutionContext,
    handler: Weak<dyn MessageHandler>,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name(format!("{}-reader", kind).to_lowercase())
        .spawn(move || read_loop(&socket, kind, mux, &context, handler, &running))?;
    Ok(handle)
}

fn read_loop(
    socket: &UdpSocket,
    kind: PacketKind,
    mux: bool,
    context: &ExecutionContext,
    handler: Weak<dyn MessageHandler>,
    running: &AtomicBool,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    while running.load(Ordering::SeqCst) {
        match socket.recv_from(&mut buf) {
            Ok((len, from)) => {
                let datagram = &buf[..len];
                let kind = if mux && rtp::is_rtcp(datagram) {
                    PacketKind::Rtcp
                } else {
                    kind
                };
                tracing::trace!(%kind, %from, len, "datagram received");
                context.post(handler.clone(), Message::new(kind, Buffer::from_slice(datagram)));
            }
            Err(ref e)
                if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::warn!(%kind, error = %e, "UDP receive error");
                }
            }
        }
    }
    tracing::debug!(%kind, "UDP reader exited");
}

fn buffer_size(value: i32) -> Result<usize> {
    usize::try_from(value).map_err(|_| {
        TransportError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "negative socket buffer size",
        ))
    })
}

fn clamp_size(size: usize) -> i32 {
    i32::try_from(size).unwrap_or(i32::MAX)
}
