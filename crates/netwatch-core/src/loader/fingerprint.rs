//! A simple passive OS-fingerprint accumulator (§4.1).
//!
//! Mirrors the shape of p0f-style heuristics: cluster on the IP
//! TTL/hop-limit a host's traffic arrives with, since common OS
//! families ship with distinct default values (64 Linux/macOS, 128
//! Windows, 255 network gear) that survive a handful of router hops.

use std::collections::HashMap;

use crate::loader::reader::OsFingerprintAccumulator;
use crate::model::PacketRecord;

const LINUX_MACOS_TTL: u8 = 64;
const WINDOWS_TTL: u8 = 128;
const NETWORK_GEAR_TTL: u8 = 255;
const HOP_TOLERANCE: u8 = 20;

/// Accumulates TTL observations keyed by source address and guesses an
/// OS family once the stream ends.
#[derive(Debug, Default)]
pub struct TtlFingerprintAccumulator {
    counts: HashMap<std::net::IpAddr, HashMap<&'static str, u32>>,
    result: HashMap<std::net::IpAddr, String>,
}

impl TtlFingerprintAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Guessed OS family per source address, available after `finalize`.
    pub fn results(&self) -> &HashMap<std::net::IpAddr, String> {
        &self.result
    }

    fn classify(ttl: u8) -> &'static str {
        let distance = |base: u8| (base as i16 - ttl as i16).unsigned_abs() as u8;
        if distance(LINUX_MACOS_TTL) <= HOP_TOLERANCE && distance(LINUX_MACOS_TTL) <= distance(WINDOWS_TTL)
        {
            "linux/macos"
        } else if distance(WINDOWS_TTL) <= HOP_TOLERANCE {
            "windows"
        } else if distance(NETWORK_GEAR_TTL) <= HOP_TOLERANCE {
            "network-gear"
        } else {
            "unknown"
        }
    }
}

impl OsFingerprintAccumulator for TtlFingerprintAccumulator {
    fn clear(&mut self) {
        self.counts.clear();
        self.result.clear();
    }

    fn observe(&mut self, record: &PacketRecord) {
        let Some(ttl_byte) = record.os_fingerprint.as_ref().and_then(|bytes| bytes.first()) else {
            return;
        };
        let family = Self::classify(*ttl_byte);
        *self
            .counts
            .entry(record.src_addr)
            .or_default()
            .entry(family)
            .or_insert(0) += 1;
    }

    fn finalize(&mut self) {
        self.result = self
            .counts
            .iter()
            .filter_map(|(addr, families)| {
                families
                    .iter()
                    .max_by_key(|(_, count)| **count)
                    .map(|(family, _)| (*addr, family.to_string()))
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProtocolTag;
    use std::net::{IpAddr, Ipv4Addr};

    fn record_with_ttl(ttl: u8) -> PacketRecord {
        PacketRecord {
            frame_number: 1,
            timestamp_ns: 0,
            length: 64,
            src_addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            dst_addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            src_port: 1234,
            dst_port: 443,
            protocol: ProtocolTag::Tcp,
            app_protocol_hint: None,
            tcp_flags: None,
            os_fingerprint: Some(vec![ttl]),
            summary: String::new(),
        }
    }

    #[test]
    fn majority_ttl_wins_classification() {
        let mut acc = TtlFingerprintAccumulator::new();
        acc.observe(&record_with_ttl(64));
        acc.observe(&record_with_ttl(63));
        acc.observe(&record_with_ttl(128));
        acc.finalize();
        let addr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(acc.results().get(&addr).map(String::as_str), Some("linux/macos"));
    }

    #[test]
    fn clear_resets_state() {
        let mut acc = TtlFingerprintAccumulator::new();
        acc.observe(&record_with_ttl(64));
        acc.finalize();
        assert!(!acc.results().is_empty());
        acc.clear();
        assert!(acc.results().is_empty());
    }
}
