//! The canonical decoded packet record (§3 `PacketRecord`).

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// TCP control bits, decoded verbatim from the segment header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TcpFlags: u16 {
        const FIN = 0b0000_0001;
        const SYN = 0b0000_0010;
        const RST = 0b0000_0100;
        const PSH = 0b0000_1000;
        const ACK = 0b0001_0000;
        const URG = 0b0010_0000;
        const ECE = 0b0100_0000;
        const CWR = 0b1000_0000;
    }
}

/// Coarse protocol classification used throughout statistics and detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolTag {
    Tcp,
    Udp,
    Icmp,
    Arp,
    Http,
    Https,
    Dns,
    Other,
}

impl ProtocolTag {
    /// Stable textual key, used for map keys and report output.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolTag::Tcp => "TCP",
            ProtocolTag::Udp => "UDP",
            ProtocolTag::Icmp => "ICMP",
            ProtocolTag::Arp => "ARP",
            ProtocolTag::Http => "HTTP",
            ProtocolTag::Https => "HTTPS",
            ProtocolTag::Dns => "DNS",
            ProtocolTag::Other => "Other",
        }
    }
}

impl std::fmt::Display for ProtocolTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single decoded packet, as produced by [`crate::loader::PacketLoader`].
///
/// Frame numbers are unique within a trace and, after the loader's optional
/// reorder step, equal the record's index into the owning vector plus one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketRecord {
    pub frame_number: u64,
    /// Capture timestamp, nanoseconds since the Unix epoch.
    pub timestamp_ns: u128,
    pub length: u16,
    pub src_addr: IpAddr,
    pub dst_addr: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: ProtocolTag,
    pub app_protocol_hint: Option<String>,
    pub tcp_flags: Option<TcpFlags>,
    /// Opaque per-packet payload handed to the OS-fingerprint accumulator.
    pub os_fingerprint: Option<Vec<u8>>,
    pub summary: String,
}

impl PacketRecord {
    /// Seconds since the Unix epoch, as an `f64` convenience for bucketing.
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp_ns as f64 / 1_000_000_000.0
    }

    /// `(src_ip, src_port, dst_ip, dst_port)` ordered exactly as captured.
    pub fn flow_key(&self) -> (IpAddr, u16, IpAddr, u16) {
        (self.src_addr, self.src_port, self.dst_addr, self.dst_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(frame_number: u64) -> PacketRecord {
        PacketRecord {
            frame_number,
            timestamp_ns: 1_500_000_000,
            length: 64,
            src_addr: "10.0.0.1".parse().unwrap(),
            dst_addr: "10.0.0.2".parse().unwrap(),
            src_port: 1234,
            dst_port: 80,
            protocol: ProtocolTag::Tcp,
            app_protocol_hint: None,
            tcp_flags: Some(TcpFlags::SYN),
            os_fingerprint: None,
            summary: "SYN".to_string(),
        }
    }

    #[test]
    fn timestamp_secs_converts_from_nanos() {
        let record = sample(1);
        assert!((record.timestamp_secs() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn flow_key_is_directional() {
        let record = sample(1);
        assert_eq!(
            record.flow_key(),
            (record.src_addr, 1234, record.dst_addr, 80)
        );
    }

    #[test]
    fn protocol_tag_display_matches_str() {
        assert_eq!(ProtocolTag::Dns.to_string(), "DNS");
    }
}
