//! VoIP QoS data model (§3, §4.6).

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Four-tuple flow key for RTP/SIP traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowKey4 {
    pub src_ip: IpAddr,
    pub src_port: u16,
    pub dst_ip: IpAddr,
    pub dst_port: u16,
}

/// Min/P5/avg/P95/max summary of a sample population.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PercentileSummary {
    pub min: f64,
    pub p5: f64,
    pub avg: f64,
    pub p95: f64,
    pub max: f64,
}

/// Per-flow latency/jitter metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceQoSFlow {
    pub flow: FlowKey4,
    pub packet_count: u64,
    pub byte_count: u64,
    pub first_seen_ns: u128,
    pub last_seen_ns: u128,
    pub latency_samples_ms: Vec<f64>,
    pub jitter_samples_ms: Vec<f64>,
    pub latency_summary: PercentileSummary,
    pub jitter_summary: PercentileSummary,
}

/// Aggregate VoIP QoS result across all eligible flows (§4.6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoiceQoSResult {
    pub flows: Vec<VoiceQoSFlow>,
    pub high_latency_flows: Vec<FlowKey4>,
    pub high_jitter_flows: Vec<FlowKey4>,
}

/// One second-aligned time-series bucket (§4.6 "Time series").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceQoSTimeSeriesPoint {
    pub bucket_start_ns: u128,
    pub packet_count: u64,
    pub active_flow_count: u64,
    pub latency_summary: PercentileSummary,
    pub jitter_summary: PercentileSummary,
}

/// Ordered sequence of per-second VoIP QoS buckets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoiceQoSTimeSeries {
    pub points: Vec<VoiceQoSTimeSeriesPoint>,
}
