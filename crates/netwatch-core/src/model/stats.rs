//! `NetworkStatistics` and the aggregates it is built from (§3, §4.3).

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use super::packet::ProtocolTag;

/// Per-protocol packet/byte counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProtocolStats {
    pub packet_count: u64,
    pub byte_count: u64,
}

/// Packet/byte totals for a single endpoint address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointStat {
    pub address: IpAddr,
    pub packet_count: u64,
    pub byte_count: u64,
}

/// Aggregate for one (src, sport, dst, dport, protocol) conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationStat {
    pub src_addr: IpAddr,
    pub src_port: u16,
    pub dst_addr: IpAddr,
    pub dst_port: u16,
    pub protocol: ProtocolTag,
    pub packet_count: u64,
    pub byte_count: u64,
    pub cross_border: bool,
}

/// Aggregate for a single port, counted Wireshark-style (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortStat {
    pub port: u16,
    pub packet_count: u64,
    pub byte_count: u64,
}

/// Rollup for a named application service (keyed by `app_protocol_hint`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStat {
    pub packet_count: u64,
    pub byte_count: u64,
}

/// Per-country traffic rollup produced by `GeoEnricher`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CountryTraffic {
    pub country_code: String,
    pub packet_count: u64,
    pub byte_count: u64,
    pub unique_ips: u64,
}

/// A traffic flow whose endpoints resolve to distinct countries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossBorderFlow {
    pub src_country: String,
    pub dst_country: String,
    pub packet_count: u64,
    pub byte_count: u64,
    pub protocols: HashSet<String>,
}

/// The complete statistics artifact produced by `StatisticsEngine` (and
/// subsequently enriched in place by `GeoEnricher`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkStatistics {
    pub protocol_stats: HashMap<String, ProtocolStats>,
    pub top_sources: Vec<EndpointStat>,
    pub top_destinations: Vec<EndpointStat>,
    pub top_conversations: Vec<ConversationStat>,
    pub top_ports: Vec<PortStat>,
    pub service_aggregates: HashMap<String, ServiceStat>,
    pub country_traffic: HashMap<String, CountryTraffic>,
    pub cross_border_flows: Vec<CrossBorderFlow>,
    pub unique_ips: HashSet<IpAddr>,
    pub first_packet_ts: Option<u128>,
    pub last_packet_ts: Option<u128>,
}

/// One bucket of a time-series (§4.3 "Time series").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub bucket_start_ns: u128,
    pub packets_per_sec: f64,
    pub bytes_per_sec: f64,
    pub anomalies_per_sec: f64,
}
