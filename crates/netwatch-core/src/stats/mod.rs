//! Pure, synchronous packet-vector aggregation (§4.3).

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

use crate::config::PipelineConfig;
use crate::model::{
    ConversationStat, EndpointStat, NetworkStatistics, PacketRecord, PortStat, ProtocolStats,
    ServiceStat, TimeSeriesPoint,
};

/// Produces `NetworkStatistics` from a packet vector. Stateless: every
/// method is a pure function of its inputs.
#[derive(Debug, Default)]
pub struct StatisticsEngine;

impl StatisticsEngine {
    pub fn new() -> Self {
        Self
    }

    /// Runs every aggregation and assembles the result, honoring
    /// `config.top_n` for all "top-N" lists.
    pub fn analyze(&self, packets: &[PacketRecord], config: &PipelineConfig) -> NetworkStatistics {
        let mut stats = NetworkStatistics::default();

        stats.protocol_stats = self.protocol_distribution(packets);
        stats.top_sources = self.top_endpoints(packets, config.top_n, |p| p.src_addr);
        stats.top_destinations = self.top_endpoints(packets, config.top_n, |p| p.dst_addr);
        stats.top_conversations = self.top_conversations(packets, config.top_n);
        stats.top_ports = self.top_ports(packets, config.top_n);
        stats.service_aggregates = self.service_aggregates(packets);
        stats.unique_ips = self.unique_ips(packets);

        stats.first_packet_ts = packets.iter().map(|p| p.timestamp_ns).min();
        stats.last_packet_ts = packets.iter().map(|p| p.timestamp_ns).max();

        stats
    }

    fn protocol_distribution(&self, packets: &[PacketRecord]) -> HashMap<String, ProtocolStats> {
        let mut map: HashMap<String, ProtocolStats> = HashMap::new();
        for packet in packets {
            let entry = map.entry(packet.protocol.to_string()).or_default();
            entry.packet_count += 1;
            entry.byte_count += packet.length as u64;
        }
        map
    }

    fn top_endpoints(
        &self,
        packets: &[PacketRecord],
        top_n: usize,
        addr_of: impl Fn(&PacketRecord) -> IpAddr,
    ) -> Vec<EndpointStat> {
        let mut totals: HashMap<IpAddr, (u64, u64)> = HashMap::new();
        for packet in packets {
            let entry = totals.entry(addr_of(packet)).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += packet.length as u64;
        }
        let mut endpoints: Vec<EndpointStat> = totals
            .into_iter()
            .map(|(address, (packet_count, byte_count))| EndpointStat {
                address,
                packet_count,
                byte_count,
            })
            .collect();
        // Ties broken by byte total, then lexicographic address (§4.3).
        endpoints.sort_by(|a, b| {
            b.packet_count
                .cmp(&a.packet_count)
                .then_with(|| b.byte_count.cmp(&a.byte_count))
                .then_with(|| a.address.to_string().cmp(&b.address.to_string()))
        });
        endpoints.truncate(top_n);
        endpoints
    }

    fn top_conversations(&self, packets: &[PacketRecord], top_n: usize) -> Vec<ConversationStat> {
        #[derive(PartialEq, Eq, Hash, Clone)]
        struct Key {
            src: IpAddr,
            sport: u16,
            dst: IpAddr,
            dport: u16,
            protocol: String,
        }
        let mut totals: HashMap<Key, (u64, u64)> = HashMap::new();
        for packet in packets {
            let key = Key {
                src: packet.src_addr,
                sport: packet.src_port,
                dst: packet.dst_addr,
                dport: packet.dst_port,
                protocol: packet.protocol.to_string(),
            };
            let entry = totals.entry(key).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += packet.length as u64;
        }
        let mut conversations: Vec<ConversationStat> = totals
            .into_iter()
            .map(|(key, (packet_count, byte_count))| ConversationStat {
                src_addr: key.src,
                src_port: key.sport,
                dst_addr: key.dst,
                dst_port: key.dport,
                protocol: packets
                    .iter()
                    .find(|p| p.protocol.to_string() == key.protocol)
                    .map(|p| p.protocol)
                    .unwrap_or(crate::model::ProtocolTag::Other),
                packet_count,
                byte_count,
                // Cross-border attribution requires geo enrichment; the
                // engine leaves this false and `GeoEnricher` flips it.
                cross_border: false,
            })
            .collect();
        conversations.sort_by(|a, b| b.packet_count.cmp(&a.packet_count));
        conversations.truncate(top_n);
        conversations
    }

    /// Wireshark-compatible port counting: a packet counts toward a port
    /// if either endpoint uses it, but only once (§4.3).
    fn top_ports(&self, packets: &[PacketRecord], top_n: usize) -> Vec<PortStat> {
        let mut totals: HashMap<u16, (u64, u64)> = HashMap::new();
        for packet in packets {
            let ports: HashSet<u16> = [packet.src_port, packet.dst_port].into_iter().collect();
            for port in ports {
                let entry = totals.entry(port).or_insert((0, 0));
                entry.0 += 1;
                entry.1 += packet.length as u64;
            }
        }
        let mut ports: Vec<PortStat> = totals
            .into_iter()
            .map(|(port, (packet_count, byte_count))| PortStat {
                port,
                packet_count,
                byte_count,
            })
            .collect();
        ports.sort_by(|a, b| b.packet_count.cmp(&a.packet_count));
        ports.truncate(top_n);
        ports
    }

    fn service_aggregates(&self, packets: &[PacketRecord]) -> HashMap<String, ServiceStat> {
        let mut map: HashMap<String, ServiceStat> = HashMap::new();
        for packet in packets {
            let Some(hint) = packet.app_protocol_hint.as_ref() else {
                continue;
            };
            let entry = map.entry(hint.clone()).or_default();
            entry.packet_count += 1;
            entry.byte_count += packet.length as u64;
        }
        map
    }

    fn unique_ips(&self, packets: &[PacketRecord]) -> HashSet<IpAddr> {
        let mut set = HashSet::new();
        for packet in packets {
            set.insert(packet.src_addr);
            set.insert(packet.dst_addr);
        }
        set
    }

    /// Buckets packets into fixed-width time-series points (§4.3 "Time
    /// series"). `anomaly_frames` are the frame numbers any detector
    /// flagged, used to derive `anomalies_per_sec`.
    pub fn time_series(
        &self,
        packets: &[PacketRecord],
        interval_ns: u128,
        anomaly_frames: &HashSet<u64>,
    ) -> Vec<TimeSeriesPoint> {
        if interval_ns == 0 || packets.is_empty() {
            return Vec::new();
        }
        #[derive(Default)]
        struct Bucket {
            packets: u64,
            bytes: u64,
            anomalies: u64,
        }
        let mut buckets: HashMap<u128, Bucket> = HashMap::new();
        for packet in packets {
            let bucket_index = packet.timestamp_ns / interval_ns;
            let bucket = buckets.entry(bucket_index).or_default();
            bucket.packets += 1;
            bucket.bytes += packet.length as u64;
            if anomaly_frames.contains(&packet.frame_number) {
                bucket.anomalies += 1;
            }
        }
        let interval_secs = interval_ns as f64 / 1e9;
        let mut points: Vec<TimeSeriesPoint> = buckets
            .into_iter()
            .map(|(index, bucket)| TimeSeriesPoint {
                bucket_start_ns: index * interval_ns,
                packets_per_sec: bucket.packets as f64 / interval_secs,
                bytes_per_sec: bucket.bytes as f64 / interval_secs,
                anomalies_per_sec: bucket.anomalies as f64 / interval_secs,
            })
            .collect();
        points.sort_by_key(|p| p.bucket_start_ns);
        points
    }
}

/// RFC 1918 / RFC 4193 / loopback / link-local classification (§4.3
/// "Internal-IP classification").
pub fn is_internal_address(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_link_local()
                || v4.octets()[0] == 10
                || (v4.octets()[0] == 172 && (16..=31).contains(&v4.octets()[1]))
                || (v4.octets()[0] == 192 && v4.octets()[1] == 168)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback() || (v6.segments()[0] & 0xfe00) == 0xfc00 || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}
