use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use rtp_transport::rtp::RtpHeader;
use rtp_transport::{
    Buffer, ExecutionContext, FakeNetworkInterface, Result, TransportSession, UdpConfig,
    UdpNetworkInterface,
};

#[derive(Parser)]
#[command(
    name = "rtp-loopback",
    about = "Send RTP/RTCP between two transport sessions and report what arrived"
)]
struct Args {
    /// Number of RTP packets to send
    #[arg(long, short = 'n', default_value_t = 10)]
    packets: u16,

    /// RTP payload size in bytes
    #[arg(long, default_value_t = 160)]
    payload_size: usize,

    /// Send one RTCP packet every N RTP packets (0 disables RTCP)
    #[arg(long, default_value_t = 5)]
    rtcp_interval: u16,

    /// Fan RTP out under these SSRCs (comma separated, hex with 0x prefix allowed)
    #[arg(long, value_delimiter = ',', value_parser = parse_ssrc)]
    conference: Vec<u32>,

    /// Use UDP sockets on 127.0.0.1 instead of the in-memory interface
    #[arg(long)]
    udp: bool,
}

fn parse_ssrc(s: &str) -> std::result::Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid SSRC '{s}': {e}"))
}

/// Minimal RTCP receiver report header for `ssrc` (RFC 3550 §6.4.2).
fn receiver_report(ssrc: u32) -> Buffer {
    let mut rtcp = Buffer::from_slice(&[0x80, 201, 0, 1]);
    rtcp.append(&ssrc.to_be_bytes());
    rtcp
}

fn send_all(session: &TransportSession, args: &Args) -> Result<()> {
    let mut header = RtpHeader::with_random_ssrc(96);
    let payload = vec![0u8; args.payload_size];
    for i in 1..=args.packets {
        session.send_rtp(&header.packet(false, &payload))?;
        header.advance_timestamp(160);
        if args.rtcp_interval > 0 && i % args.rtcp_interval == 0 {
            session.send_rtcp(&receiver_report(header.ssrc))?;
        }
    }
    Ok(())
}

fn run_fake(args: &Args, receiver: Arc<TransportSession>) -> Result<()> {
    let iface = Arc::new(FakeNetworkInterface::new(ExecutionContext::new()));
    iface.set_destination(Some(receiver));
    if !args.conference.is_empty() {
        iface.set_conference_mode(true, &args.conference);
    }

    let sender = TransportSession::with_interface(iface.clone());
    send_all(&sender, args)?;
    let delivered = iface.context().process_pending();

    println!(
        "captured {} RTP ({} bytes), {} RTCP; {} deliveries",
        iface.num_rtp_packets(),
        iface.num_rtp_bytes(),
        iface.num_rtcp_packets(),
        delivered
    );
    Ok(())
}

fn run_udp(args: &Args, receiver: Arc<TransportSession>) -> Result<()> {
    if !args.conference.is_empty() {
        tracing::warn!("conference fan-out only applies to the in-memory interface");
    }

    let near = Arc::new(UdpNetworkInterface::bind(UdpConfig::default())?);
    let far = UdpNetworkInterface::bind(UdpConfig::default())?;
    near.set_remote(Some(far.local_rtp_addr()?), Some(far.local_rtcp_addr()?));
    let from = near.local_rtp_addr()?;

    let context = ExecutionContext::new();
    let _loop = context.spawn()?;
    let _readers = far.start(&context, receiver.clone())?;

    let sender = TransportSession::with_interface(near);
    send_all(&sender, args)?;

    let sent = sender.stats();
    let deadline = Instant::now() + Duration::from_secs(1);
    while Instant::now() < deadline {
        let got = receiver.stats();
        if got.rtp_received == sent.rtp_sent && got.rtcp_received == sent.rtcp_sent {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }

    println!(
        "sent {} RTP, {} RTCP from {} to {}",
        sent.rtp_sent.packets,
        sent.rtcp_sent.packets,
        from,
        far.local_rtp_addr()?
    );
    Ok(())
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let receiver = Arc::new(TransportSession::new());

    let outcome = if args.udp {
        run_udp(&args, receiver.clone())
    } else {
        run_fake(&args, receiver.clone())
    };
    if let Err(e) = outcome {
        eprintln!("Loopback failed: {}", e);
        return;
    }

    let stats = receiver.stats();
    println!(
        "received {} RTP ({} bytes), {} RTCP",
        stats.rtp_received.packets, stats.rtp_received.bytes, stats.rtcp_received.packets
    );
    for (ssrc, counters) in &stats.sources {
        println!("  ssrc {:#010X}: {} packets", ssrc, counters.packets);
    }
}
