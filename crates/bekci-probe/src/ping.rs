//! ICMP echo probe over raw/DGRAM sockets.
//!
//! Runs on a blocking thread: reply matching needs tight timing and the
//! sockets block on recv. RAW sockets need CAP_NET_RAW; DGRAM works
//! unprivileged on hosts with ping_group_range configured. When neither can
//! be created the probe reports down with the OS error.

use crate::{ProbeConfig, ProbeResult};
use serde_json::json;
use socket2::{Domain, Protocol, Socket, Type};
use std::mem::MaybeUninit;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};

static PING_SEQUENCE: AtomicU16 = AtomicU16::new(0);

pub(crate) async fn run_ping(host: &str, config: &ProbeConfig) -> ProbeResult {
    let count = config.int("count", 3).clamp(1, 30) as u16;
    let timeout_s = config.int("timeout_s", 5).max(1) as u64;
    let timeout = Duration::from_secs(timeout_s);

    let ip = match resolve(host).await {
        Ok(ip) => ip,
        Err(msg) => return ProbeResult::down(msg),
    };

    let start = Instant::now();
    let outcome =
        tokio::task::spawn_blocking(move || blocking_ping(ip, count, timeout)).await;
    let elapsed = start.elapsed().as_millis() as i64;

    let stats = match outcome {
        Ok(Ok(stats)) => stats,
        Ok(Err(msg)) => return ProbeResult::down(msg),
        Err(e) => return ProbeResult::down(format!("ping task failed: {e}")),
    };

    let packet_loss =
        100.0 * (stats.sent - stats.received) as f64 / stats.sent.max(1) as f64;
    let avg_rtt_ms = if stats.received > 0 {
        stats.total_rtt.as_secs_f64() * 1000.0 / stats.received as f64
    } else {
        0.0
    };

    let mut result = if stats.received == 0 {
        ProbeResult::down("100% packet loss")
    } else {
        ProbeResult::up(format!(
            "{}/{} packets received, avg {:.1}ms",
            stats.received, stats.sent, avg_rtt_ms
        ))
    };
    result.response_ms = elapsed;
    result
        .metrics
        .insert("packet_loss".to_string(), json!(packet_loss));
    result
        .metrics
        .insert("avg_rtt_ms".to_string(), json!(avg_rtt_ms));
    result
        .metrics
        .insert("packets_sent".to_string(), json!(stats.sent));
    result
        .metrics
        .insert("packets_recv".to_string(), json!(stats.received));
    result
}

async fn resolve(host: &str) -> Result<IpAddr, String> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host(format!("{host}:0"))
        .await
        .map_err(|e| format!("DNS resolution failed: {e}"))?
        .collect();
    addrs
        .into_iter()
        .next()
        .map(|sa| sa.ip())
        .ok_or_else(|| format!("no addresses found for {host}"))
}

struct PingStats {
    sent: u16,
    received: u16,
    total_rtt: Duration,
}

fn blocking_ping(ip: IpAddr, count: u16, timeout: Duration) -> Result<PingStats, String> {
    let socket = open_socket(ip)?;
    let deadline = Instant::now() + timeout;

    let identifier: u16 = rand::random();
    let mut sent = 0u16;
    let mut received = 0u16;
    let mut total_rtt = Duration::ZERO;

    for _ in 0..count {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        socket
            .set_read_timeout(Some(remaining))
            .map_err(|e| format!("set timeout: {e}"))?;

        let sequence = PING_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let packet = build_echo_request(ip, identifier, sequence);

        let start = Instant::now();
        if let Err(e) = socket.send(&packet) {
            return Err(format!("icmp send failed: {e}"));
        }
        sent += 1;

        if let Some(rtt) = wait_for_reply(&socket, ip, identifier, sequence, deadline, start) {
            received += 1;
            total_rtt += rtt;
        }
    }

    if sent == 0 {
        return Err("ping budget exhausted before any packet was sent".to_string());
    }
    Ok(PingStats {
        sent,
        received,
        total_rtt,
    })
}

fn open_socket(ip: IpAddr) -> Result<Socket, String> {
    let (domain, protocol) = match ip {
        IpAddr::V4(_) => (Domain::IPV4, Protocol::ICMPV4),
        IpAddr::V6(_) => (Domain::IPV6, Protocol::ICMPV6),
    };
    // RAW first (privileged), then DGRAM (unprivileged where permitted).
    let socket = Socket::new(domain, Type::RAW, Some(protocol))
        .or_else(|_| Socket::new(domain, Type::DGRAM, Some(protocol)))
        .map_err(|e| format!("icmp socket unavailable (needs CAP_NET_RAW): {e}"))?;

    let dest = SocketAddr::new(ip, 0);
    socket
        .connect(&dest.into())
        .map_err(|e| format!("icmp connect failed: {e}"))?;
    Ok(socket)
}

/// Read replies until ours arrives or the deadline passes.
fn wait_for_reply(
    socket: &Socket,
    ip: IpAddr,
    identifier: u16,
    sequence: u16,
    deadline: Instant,
    sent_at: Instant,
) -> Option<Duration> {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return None;
        }
        socket.set_read_timeout(Some(remaining)).ok()?;

        let mut buf = [MaybeUninit::<u8>::uninit(); 1500];
        let len = match socket.recv(&mut buf) {
            Ok(len) => len,
            Err(_) => return None,
        };
        let rtt = sent_at.elapsed();

        // SAFETY: recv initialized `len` bytes
        let buf: &[u8] =
            unsafe { std::slice::from_raw_parts(buf.as_ptr() as *const u8, len) };

        if matches_reply(buf, ip, identifier, sequence) {
            return Some(rtt);
        }
        // Someone else's reply; keep waiting for ours.
    }
}

fn matches_reply(buf: &[u8], ip: IpAddr, identifier: u16, sequence: u16) -> bool {
    if buf.len() < 8 {
        return false;
    }
    // RAW IPv4 sockets deliver the IP header; DGRAM and IPv6 do not.
    let offset = if ip.is_ipv4() && buf[0] >> 4 == 4 { 20 } else { 0 };
    if buf.len() < offset + 8 {
        return false;
    }
    let reply_type = buf[offset];
    let reply_id = u16::from_be_bytes([buf[offset + 4], buf[offset + 5]]);
    let reply_seq = u16::from_be_bytes([buf[offset + 6], buf[offset + 7]]);

    let echo_reply = if ip.is_ipv4() { 0 } else { 129 };
    reply_type == echo_reply && reply_id == identifier && reply_seq == sequence
}

/// ICMP(v6) Echo Request: 8-byte header + 56-byte payload.
fn build_echo_request(ip: IpAddr, identifier: u16, sequence: u16) -> Vec<u8> {
    let mut packet = vec![0u8; 64];
    packet[0] = if ip.is_ipv4() { 8 } else { 128 };
    packet[1] = 0;
    packet[4..6].copy_from_slice(&identifier.to_be_bytes());
    packet[6..8].copy_from_slice(&sequence.to_be_bytes());

    if ip.is_ipv4() {
        let checksum = icmp_checksum(&packet);
        packet[2..4].copy_from_slice(&checksum.to_be_bytes());
    }
    // ICMPv6 checksum is filled in by the kernel.

    packet
}

/// RFC 1071 internet checksum.
fn icmp_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut i = 0;

    while i + 1 < data.len() {
        sum += u16::from_be_bytes([data[i], data[i + 1]]) as u32;
        i += 2;
    }
    if i < data.len() {
        sum += (data[i] as u32) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !sum as u16
}
