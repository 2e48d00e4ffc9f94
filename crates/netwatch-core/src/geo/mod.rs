//! Country attribution for statistics output (§4.4).

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

use crate::model::{ConversationStat, CountryTraffic, CrossBorderFlow, NetworkStatistics, PacketRecord};
use crate::stats::is_internal_address;

/// Sentinel country code for private/loopback addresses, never
/// cross-border.
pub const LOCAL_SENTINEL: &str = "Local";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone)]
pub struct GeoInfo {
    pub country_code: String,
    pub country_name: String,
    pub risk_level: RiskLevel,
}

/// Backend capability: resolve one address to country attribution.
/// Implementations may hit a local MaxMind-style database, a remote API,
/// or (in tests) a fixed table.
pub trait GeoBackend: Send + Sync {
    fn lookup(&self, ip: IpAddr) -> Option<GeoInfo>;
}

/// Static table of countries carrying elevated risk, with the reason and
/// representative known-threat activity (§4.4).
pub struct HighRiskEntry {
    pub country_code: &'static str,
    pub reason: &'static str,
    pub known_threats: &'static [&'static str],
}

pub const HIGH_RISK_COUNTRIES: &[HighRiskEntry] = &[
    HighRiskEntry {
        country_code: "CN",
        reason: "state-sponsored APT activity observed at scale",
        known_threats: &["APT41", "APT10"],
    },
    HighRiskEntry {
        country_code: "RU",
        reason: "ransomware and botnet infrastructure hosting",
        known_threats: &["Sandworm", "Conti"],
    },
    HighRiskEntry {
        country_code: "KP",
        reason: "state-sponsored financially motivated intrusion sets",
        known_threats: &["Lazarus Group"],
    },
    HighRiskEntry {
        country_code: "IR",
        reason: "state-sponsored destructive and espionage campaigns",
        known_threats: &["APT33", "APT34"],
    },
];

pub fn is_high_risk_country(country_code: &str) -> bool {
    HIGH_RISK_COUNTRIES.iter().any(|c| c.country_code == country_code)
}

/// A `GeoBackend` that never resolves anything. The GeoIP database itself
/// is out of scope (§1 "interface-only"); callers with no database wired
/// up pass this through and get an unenriched (but still correct) result.
#[derive(Debug, Default)]
pub struct NoopGeoBackend;

impl GeoBackend for NoopGeoBackend {
    fn lookup(&self, _ip: IpAddr) -> Option<GeoInfo> {
        None
    }
}

/// Enriches `NetworkStatistics` with country attribution, sampling and
/// caching lookups in a process-scoped map owned by the enricher.
pub struct GeoEnricher<B: GeoBackend> {
    backend: B,
    cache: std::sync::Mutex<HashMap<IpAddr, Option<GeoInfo>>>,
}

impl<B: GeoBackend> GeoEnricher<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            cache: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn resolve(&self, ip: IpAddr) -> Option<GeoInfo> {
        if is_internal_address(ip) {
            return Some(GeoInfo {
                country_code: LOCAL_SENTINEL.to_string(),
                country_name: LOCAL_SENTINEL.to_string(),
                risk_level: RiskLevel::Low,
            });
        }
        if let Some(cached) = self.cache.lock().unwrap().get(&ip) {
            return cached.clone();
        }
        let info = self.backend.lookup(ip);
        self.cache.lock().unwrap().insert(ip, info.clone());
        info
    }

    /// Populates `country_traffic`, `cross_border_flows`, and flips the
    /// `cross_border` flag on each `top_conversations` entry in place.
    ///
    /// Stratified sampling: only the top-`sample_size` IPs by packet
    /// volume in this trace are actually looked up; the rest fall back
    /// to an unresolved (skipped) attribution, keeping lookup volume
    /// bounded on traces with many distinct addresses.
    pub fn enrich(&self, packets: &[PacketRecord], stats: &mut NetworkStatistics, sample_size: usize) {
        let sampled = self.stratified_sample(packets, sample_size);
        let mut resolved: HashMap<IpAddr, GeoInfo> = HashMap::new();
        for ip in sampled {
            if let Some(info) = self.resolve(ip) {
                resolved.insert(ip, info);
            }
        }

        let mut country_traffic: HashMap<String, CountryTraffic> = HashMap::new();
        let mut country_unique_ips: HashMap<String, HashSet<IpAddr>> = HashMap::new();
        for packet in packets {
            for ip in [packet.src_addr, packet.dst_addr] {
                let Some(info) = resolved.get(&ip) else {
                    continue;
                };
                let entry = country_traffic
                    .entry(info.country_code.clone())
                    .or_insert_with(|| CountryTraffic {
                        country_code: info.country_code.clone(),
                        packet_count: 0,
                        byte_count: 0,
                        unique_ips: 0,
                    });
                entry.packet_count += 1;
                entry.byte_count += packet.length as u64;
                country_unique_ips
                    .entry(info.country_code.clone())
                    .or_default()
                    .insert(ip);
            }
        }
        for (code, ips) in &country_unique_ips {
            if let Some(entry) = country_traffic.get_mut(code) {
                entry.unique_ips = ips.len() as u64;
            }
        }
        stats.country_traffic = country_traffic;

        stats.cross_border_flows = self.cross_border_flows(packets, &resolved);
        for conversation in &mut stats.top_conversations {
            conversation.cross_border = self.is_cross_border(conversation, &resolved);
        }
    }

    fn stratified_sample(&self, packets: &[PacketRecord], sample_size: usize) -> Vec<IpAddr> {
        let mut counts: HashMap<IpAddr, u64> = HashMap::new();
        for packet in packets {
            *counts.entry(packet.src_addr).or_insert(0) += 1;
            *counts.entry(packet.dst_addr).or_insert(0) += 1;
        }
        let mut by_volume: Vec<(IpAddr, u64)> = counts.into_iter().collect();
        by_volume.sort_by(|a, b| b.1.cmp(&a.1));
        by_volume.truncate(sample_size);
        by_volume.into_iter().map(|(ip, _)| ip).collect()
    }

    fn is_cross_border(&self, conversation: &ConversationStat, resolved: &HashMap<IpAddr, GeoInfo>) -> bool {
        let src = resolved.get(&conversation.src_addr);
        let dst = resolved.get(&conversation.dst_addr);
        match (src, dst) {
            (Some(src), Some(dst)) => {
                src.country_code != LOCAL_SENTINEL
                    && dst.country_code != LOCAL_SENTINEL
                    && src.country_code != dst.country_code
            }
            _ => false,
        }
    }

    fn cross_border_flows(
        &self,
        packets: &[PacketRecord],
        resolved: &HashMap<IpAddr, GeoInfo>,
    ) -> Vec<CrossBorderFlow> {
        let mut flows: HashMap<(String, String), (u64, u64, HashSet<String>)> = HashMap::new();
        for packet in packets {
            let Some(src) = resolved.get(&packet.src_addr) else {
                continue;
            };
            let Some(dst) = resolved.get(&packet.dst_addr) else {
                continue;
            };
            if src.country_code == LOCAL_SENTINEL
                || dst.country_code == LOCAL_SENTINEL
                || src.country_code == dst.country_code
            {
                continue;
            }
            let entry = flows
                .entry((src.country_code.clone(), dst.country_code.clone()))
                .or_insert_with(|| (0, 0, HashSet::new()));
            entry.0 += 1;
            entry.1 += packet.length as u64;
            entry.2.insert(packet.protocol.to_string());
        }
        flows
            .into_iter()
            .map(|((src_country, dst_country), (packet_count, byte_count, protocols))| CrossBorderFlow {
                src_country,
                dst_country,
                packet_count,
                byte_count,
                protocols,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProtocolTag;

    struct FixedBackend;

    impl GeoBackend for FixedBackend {
        fn lookup(&self, ip: IpAddr) -> Option<GeoInfo> {
            match ip.to_string().as_str() {
                "1.1.1.1" => Some(GeoInfo {
                    country_code: "US".to_string(),
                    country_name: "United States".to_string(),
                    risk_level: RiskLevel::Low,
                }),
                "8.8.8.8" => Some(GeoInfo {
                    country_code: "CN".to_string(),
                    country_name: "China".to_string(),
                    risk_level: RiskLevel::High,
                }),
                _ => None,
            }
        }
    }

    fn packet(src: &str, dst: &str) -> PacketRecord {
        PacketRecord {
            frame_number: 1,
            timestamp_ns: 0,
            length: 100,
            src_addr: src.parse().unwrap(),
            dst_addr: dst.parse().unwrap(),
            src_port: 1,
            dst_port: 2,
            protocol: ProtocolTag::Tcp,
            app_protocol_hint: None,
            tcp_flags: None,
            os_fingerprint: None,
            summary: String::new(),
        }
    }

    #[test]
    fn private_address_resolves_to_local_sentinel() {
        let enricher = GeoEnricher::new(FixedBackend);
        let info = enricher.resolve("10.0.0.1".parse().unwrap()).unwrap();
        assert_eq!(info.country_code, LOCAL_SENTINEL);
    }

    #[test]
    fn cross_border_flow_detected_for_distinct_countries() {
        let enricher = GeoEnricher::new(FixedBackend);
        let packets = vec![packet("1.1.1.1", "8.8.8.8")];
        let mut stats = NetworkStatistics::default();
        enricher.enrich(&packets, &mut stats, 10);
        assert_eq!(stats.cross_border_flows.len(), 1);
        assert_eq!(stats.cross_border_flows[0].src_country, "US");
        assert_eq!(stats.cross_border_flows[0].dst_country, "CN");
    }

    #[test]
    fn local_to_local_never_cross_border() {
        let enricher = GeoEnricher::new(FixedBackend);
        let packets = vec![packet("10.0.0.1", "10.0.0.2")];
        let mut stats = NetworkStatistics::default();
        enricher.enrich(&packets, &mut stats, 10);
        assert!(stats.cross_border_flows.is_empty());
    }

    #[test]
    fn high_risk_table_recognizes_known_codes() {
        assert!(is_high_risk_country("CN"));
        assert!(!is_high_risk_country("US"));
    }
}
