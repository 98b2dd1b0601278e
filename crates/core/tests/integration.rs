//! Integration tests: two sessions wired back to back, first over the
//! in-memory interface, then over UDP on the loopback address.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rtp_transport::rtp::{self, RtpHeader, SSRC_OFFSET};
use rtp_transport::{
    Buffer, ChannelReceiver, ExecutionContext, FakeNetworkInterface, MediaReceiver,
    NetworkInterface, PacketKind, RecordingReceiver, SocketOption, SocketType, TransportSession,
    UdpConfig, UdpNetworkInterface,
};

/// Sender session whose fake interface delivers into `receiver`.
fn fake_link(receiver: Arc<dyn MediaReceiver>) -> (TransportSession, Arc<FakeNetworkInterface>) {
    let iface = Arc::new(FakeNetworkInterface::new(ExecutionContext::new()));
    iface.set_destination(Some(receiver));
    let session = TransportSession::with_interface(iface.clone());
    (session, iface)
}

fn packet_16(ssrc: u32, fill: u8) -> Buffer {
    let mut bytes = vec![fill; 16];
    bytes[0] = 0x80;
    bytes[1] = 0;
    bytes[2..4].copy_from_slice(&7u16.to_be_bytes());
    bytes[SSRC_OFFSET..SSRC_OFFSET + 4].copy_from_slice(&ssrc.to_be_bytes());
    Buffer::from(bytes)
}

fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    done()
}

#[test]
fn direct_then_conference_scenario() {
    let dest = Arc::new(RecordingReceiver::new());
    let (session, iface) = fake_link(dest.clone());

    let p1 = packet_16(0x0000_0001, 0xAA);
    session.send_rtp(&p1).unwrap();
    iface.context().process_pending();
    assert_eq!(dest.rtp_packets(), vec![p1.clone()]);

    iface.set_conference_mode(true, &[0x10, 0x20]);
    let p2 = packet_16(0x0000_0001, 0xBB);
    session.send_rtp(&p2).unwrap();
    iface.context().process_pending();

    let got = dest.rtp_packets();
    assert_eq!(got.len(), 3);
    assert_eq!(rtp::ssrc(got[1].data()), Some(0x10));
    assert_eq!(rtp::ssrc(got[2].data()), Some(0x20));
    for copy in &got[1..] {
        let mut restored = copy.clone();
        restored.write_be32(SSRC_OFFSET, 1).unwrap();
        assert_eq!(restored, p2);
    }

    assert_eq!(iface.num_rtp_packets(), 2);
    assert_eq!(iface.num_rtp_bytes(), 32);
}

#[test]
fn sessions_back_to_back_over_fake_interface() {
    let receiver = Arc::new(TransportSession::new());
    let (sender, iface) = fake_link(receiver.clone());

    let mut header = RtpHeader::new(96, 0x1234_5678);
    for i in 0..20u8 {
        sender.send_rtp(&header.packet(i == 19, &[i; 40])).unwrap();
    }
    sender
        .send_rtcp(&Buffer::from_slice(&[0x80, 0xC8, 0, 6, 0x12, 0x34, 0x56, 0x78]))
        .unwrap();

    assert_eq!(iface.context().process_pending(), 21);

    let stats = receiver.stats();
    assert_eq!(stats.rtp_received.packets, 20);
    assert_eq!(stats.rtp_received.bytes, 20 * 52);
    assert_eq!(stats.rtcp_received.packets, 1);
    assert_eq!(receiver.sources(), vec![0x1234_5678]);
    assert_eq!(sender.stats().rtp_sent, stats.rtp_received);
}

#[test]
fn conference_mode_shows_up_as_sources() {
    let receiver = Arc::new(TransportSession::new());
    let (sender, iface) = fake_link(receiver.clone());
    let ssrcs = [0xA1, 0xB2, 0xC3];
    iface.set_conference_mode(true, &ssrcs);

    let mut header = RtpHeader::new(0, 0x99);
    for _ in 0..4 {
        sender.send_rtp(&header.packet(false, &[0; 160])).unwrap();
    }
    sender.send_rtcp(&Buffer::from_slice(&[0; 8])).unwrap();
    iface.context().process_pending();

    assert_eq!(receiver.sources(), vec![0xA1, 0xB2, 0xC3]);
    for ssrc in ssrcs {
        assert_eq!(receiver.packets_from(ssrc), 4);
    }
    assert_eq!(receiver.packets_from(0x99), 0);
    assert_eq!(receiver.stats().rtcp_received.packets, 0);
    assert_eq!(iface.num_rtcp_packets(), 1);

    iface.set_conference_mode(false, &[]);
    sender.send_rtp(&header.packet(false, &[0; 160])).unwrap();
    iface.context().process_pending();
    assert_eq!(receiver.packets_from(0x99), 1);
}

#[test]
fn capture_counts_are_monotonic_without_destination() {
    let iface = FakeNetworkInterface::default();
    let mut last = (0, 0);
    for len in [12usize, 40, 200, 13] {
        iface.send_packet(&Buffer::from_slice(&vec![0; len])).unwrap();
        let now = (iface.num_rtp_packets(), iface.num_rtp_bytes());
        assert!(now.0 > last.0 && now.1 > last.1);
        last = now;
    }
    assert_eq!(last, (4, 265));
    assert_eq!(iface.rtp_packet(4), None);
    assert_eq!(iface.rtcp_packet(0), None);
}

#[test]
fn spawned_loop_delivers_from_other_thread() {
    let ctx = ExecutionContext::new();
    let mut worker = ctx.spawn().unwrap();
    let (receiver, rx) = ChannelReceiver::new();

    let iface = Arc::new(FakeNetworkInterface::new(ctx.clone()));
    iface.set_destination(Some(Arc::new(receiver)));

    let producer = {
        let iface = iface.clone();
        thread::spawn(move || {
            let mut header = RtpHeader::new(8, 5);
            for i in 0..50u8 {
                iface.send_packet(&header.packet(false, &[i])).unwrap();
            }
        })
    };
    producer.join().unwrap();

    let mut sequences = Vec::new();
    for _ in 0..50 {
        let delivery = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(delivery.kind, PacketKind::Rtp);
        sequences.push(rtp::sequence(delivery.packet.data()).unwrap());
    }
    assert_eq!(sequences, (0..50).collect::<Vec<u16>>());

    worker.stop();
    assert_eq!(iface.num_rtp_packets(), 50);
}

#[test]
fn socket_options_recorded_on_fake() {
    let (session, iface) = fake_link(Arc::new(RecordingReceiver::new()));
    session
        .set_option(SocketType::Rtp, SocketOption::SendBufferSize, 65536)
        .unwrap();
    session
        .set_option(SocketType::Rtp, SocketOption::NoDelay, 1)
        .unwrap();
    assert_eq!(iface.sendbuf_size(), 65536);
    assert_eq!(iface.recvbuf_size(), -1);
}

#[test]
fn udp_loopback_between_sessions() {
    let a = Arc::new(UdpNetworkInterface::bind(UdpConfig::default()).expect("bind a"));
    let b = Arc::new(UdpNetworkInterface::bind(UdpConfig::default()).expect("bind b"));
    a.set_remote(
        Some(b.local_rtp_addr().unwrap()),
        Some(b.local_rtcp_addr().unwrap()),
    );

    let ctx = ExecutionContext::new();
    let _worker = ctx.spawn().unwrap();
    let receiver = Arc::new(TransportSession::new());
    let _readers = b.start(&ctx, receiver.clone()).unwrap();

    let sender = TransportSession::with_interface(a.clone());
    let mut header = RtpHeader::new(96, 0xFEED);
    for _ in 0..5 {
        sender.send_rtp(&header.packet(false, b"hello")).unwrap();
    }
    sender
        .send_rtcp(&Buffer::from_slice(&[0x80, 0xC9, 0, 1, 0, 0, 0xFE, 0xED]))
        .unwrap();

    assert!(
        wait_until(|| {
            let stats = receiver.stats();
            stats.rtp_received.packets == 5 && stats.rtcp_received.packets == 1
        }),
        "UDP packets not delivered: {:?}",
        receiver.stats()
    );
    assert_eq!(receiver.sources(), vec![0xFEED]);
}

#[test]
fn udp_rtcp_mux_keeps_packet_classes() {
    let mux = UdpConfig {
        rtcp_mux: true,
        ..UdpConfig::default()
    };
    let a = Arc::new(UdpNetworkInterface::bind(mux.clone()).unwrap());
    let b = UdpNetworkInterface::bind(mux).unwrap();
    a.set_remote(Some(b.local_rtp_addr().unwrap()), None);

    let ctx = ExecutionContext::new();
    let receiver = Arc::new(TransportSession::new());
    let mut readers = b.start(&ctx, receiver.clone()).unwrap();

    let sender = TransportSession::with_interface(a);
    let mut header = RtpHeader::new(96, 0xFEED);
    sender.send_rtp(&header.packet(false, b"muxed")).unwrap();
    sender
        .send_rtcp(&Buffer::from_slice(&[0x81, 0xC9, 0, 1, 0, 0, 0xFE, 0xED]))
        .unwrap();

    assert!(wait_until(|| ctx.pending() == 2));
    readers.stop();
    assert!(!readers.is_running());
    ctx.process_pending();

    let stats = receiver.stats();
    assert_eq!(stats.rtp_received.packets, 1);
    assert_eq!(stats.rtcp_received.packets, 1);
    assert_eq!(receiver.sources(), vec![0xFEED]);
}

#[test]
fn capture_log_readable_while_sending() {
    let ctx = ExecutionContext::new();
    let _worker = ctx.spawn().unwrap();
    let iface = Arc::new(FakeNetworkInterface::new(ctx));
    iface.set_destination(Some(Arc::new(RecordingReceiver::new())));

    let producer = {
        let iface = iface.clone();
        thread::spawn(move || {
            let mut header = RtpHeader::new(0, 9);
            for i in 0..500u16 {
                iface
                    .send_packet(&header.packet(false, &i.to_be_bytes()))
                    .unwrap();
            }
        })
    };

    let mut last = 0;
    while !producer.is_finished() {
        let count = iface.num_rtp_packets();
        assert!(count >= last, "capture count went backwards");
        assert!(iface.num_rtp_bytes() >= count * 14);
        if count > 0 {
            let packet = iface.rtp_packet(count - 1).expect("captured packet");
            assert_eq!(packet.len(), 14);
            assert_eq!(rtp::sequence(packet.data()), Some((count - 1) as u16));
        }
        assert_eq!(iface.rtp_packet(500), None);
        last = count;
    }
    producer.join().unwrap();

    assert_eq!(iface.num_rtp_packets(), 500);
    assert_eq!(iface.num_rtp_bytes(), 500 * 14);
    assert_eq!(iface.rtp_packets().len(), 500);
}
