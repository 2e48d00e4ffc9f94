//! VoIP QoS extraction (§4.6).

use std::collections::HashMap;

use crate::config::PipelineConfig;
use crate::model::{
    FlowKey4, PacketRecord, PercentileSummary, VoiceQoSFlow, VoiceQoSResult,
    VoiceQoSTimeSeries, VoiceQoSTimeSeriesPoint,
};

const SIP_PORTS: [u16; 2] = [5060, 5061];
const RTP_PORT_RANGE: std::ops::RangeInclusive<u16> = 16384..=32767;

/// Discard inter-packet deltas that can't be real latency samples.
const MIN_REALISTIC_DELTA_MS: f64 = 0.0;
const MAX_REALISTIC_DELTA_MS: f64 = 5000.0;

pub fn is_qos_eligible(packet: &PacketRecord) -> bool {
    SIP_PORTS.contains(&packet.src_port)
        || SIP_PORTS.contains(&packet.dst_port)
        || RTP_PORT_RANGE.contains(&packet.src_port)
        || RTP_PORT_RANGE.contains(&packet.dst_port)
}

/// Extracts per-flow and time-bucketed VoIP QoS metrics (§4.6).
#[derive(Debug, Default)]
pub struct VoiceQoSExtractor;

impl VoiceQoSExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, packets: &[PacketRecord], config: &PipelineConfig) -> VoiceQoSResult {
        let eligible: Vec<&PacketRecord> = packets.iter().filter(|p| is_qos_eligible(p)).collect();

        let mut by_flow: HashMap<FlowKey4, Vec<&PacketRecord>> = HashMap::new();
        for packet in &eligible {
            let key = FlowKey4 {
                src_ip: packet.src_addr,
                src_port: packet.src_port,
                dst_ip: packet.dst_addr,
                dst_port: packet.dst_port,
            };
            by_flow.entry(key).or_default().push(packet);
        }

        let mut flows = Vec::new();
        let mut high_latency = Vec::new();
        let mut high_jitter = Vec::new();

        let mut keys: Vec<&FlowKey4> = by_flow.keys().collect();
        keys.sort_by_key(|k| (k.src_ip, k.src_port, k.dst_ip, k.dst_port));
        for key in keys {
            let mut records = by_flow[key].clone();
            records.sort_by_key(|p| p.timestamp_ns);

            let latency_samples = latency_samples_ms(&records);
            let jitter_samples = jitter_samples_ms(&latency_samples);

            let latency_summary = percentile_summary(&latency_samples);
            let jitter_summary = percentile_summary(&jitter_samples);

            if latency_summary.avg > config.voip_high_latency_ms {
                high_latency.push(*key);
            }
            if jitter_summary.avg > config.voip_high_jitter_ms {
                high_jitter.push(*key);
            }

            flows.push(VoiceQoSFlow {
                flow: *key,
                packet_count: records.len() as u64,
                byte_count: records.iter().map(|p| p.length as u64).sum(),
                first_seen_ns: records.first().map(|p| p.timestamp_ns).unwrap_or(0),
                last_seen_ns: records.last().map(|p| p.timestamp_ns).unwrap_or(0),
                latency_samples_ms: latency_samples,
                jitter_samples_ms: jitter_samples,
                latency_summary,
                jitter_summary,
            });
        }

        VoiceQoSResult {
            flows,
            high_latency_flows: high_latency,
            high_jitter_flows: high_jitter,
        }
    }

    /// Buckets eligible packets by one-second walls and computes
    /// per-bucket latency/jitter summaries and active-flow counts (§4.6
    /// "Time series").
    pub fn time_series(&self, packets: &[PacketRecord]) -> VoiceQoSTimeSeries {
        let eligible: Vec<&PacketRecord> = packets.iter().filter(|p| is_qos_eligible(p)).collect();

        let mut by_flow: HashMap<FlowKey4, Vec<&PacketRecord>> = HashMap::new();
        for packet in &eligible {
            let key = FlowKey4 {
                src_ip: packet.src_addr,
                src_port: packet.src_port,
                dst_ip: packet.dst_addr,
                dst_port: packet.dst_port,
            };
            by_flow.entry(key).or_default().push(packet);
        }

        #[derive(Default)]
        struct BucketAccum {
            latency_ms: Vec<f64>,
            jitter_ms: Vec<f64>,
            packet_count: u64,
            flows: std::collections::HashSet<FlowKey4>,
        }
        let mut buckets: HashMap<u128, BucketAccum> = HashMap::new();

        for (key, records) in &by_flow {
            let mut records = records.clone();
            records.sort_by_key(|p| p.timestamp_ns);
            let latency_samples = latency_samples_ms(&records);
            let jitter_samples = jitter_samples_ms(&latency_samples);

            // Bucket each computed latency/jitter sample by the later
            // packet's second-aligned wall-clock bucket.
            for (i, &latency) in latency_samples.iter().enumerate() {
                let packet = records[i + 1];
                let bucket_secs = packet.timestamp_ns / 1_000_000_000;
                let accum = buckets.entry(bucket_secs).or_default();
                accum.latency_ms.push(latency);
                if i < jitter_samples.len() {
                    accum.jitter_ms.push(jitter_samples[i]);
                }
            }
            for packet in &records {
                let bucket_secs = packet.timestamp_ns / 1_000_000_000;
                let accum = buckets.entry(bucket_secs).or_default();
                accum.packet_count += 1;
                accum.flows.insert(*key);
            }
        }

        let mut points: Vec<VoiceQoSTimeSeriesPoint> = buckets
            .into_iter()
            .map(|(bucket_secs, accum)| VoiceQoSTimeSeriesPoint {
                bucket_start_ns: bucket_secs * 1_000_000_000,
                packet_count: accum.packet_count,
                active_flow_count: accum.flows.len() as u64,
                latency_summary: percentile_summary(&accum.latency_ms),
                jitter_summary: percentile_summary(&accum.jitter_ms),
            })
            .collect();
        points.sort_by_key(|p| p.bucket_start_ns);
        VoiceQoSTimeSeries { points }
    }
}

/// Inter-packet deltas in milliseconds, discarding unrealistic values
/// (§4.6 "Per-flow metrics").
fn latency_samples_ms(records: &[&PacketRecord]) -> Vec<f64> {
    let mut samples = Vec::new();
    for pair in records.windows(2) {
        let delta_ns = pair[1].timestamp_ns.saturating_sub(pair[0].timestamp_ns);
        let delta_ms = delta_ns as f64 / 1_000_000.0;
        if delta_ms > MIN_REALISTIC_DELTA_MS && delta_ms < MAX_REALISTIC_DELTA_MS {
            samples.push(delta_ms);
        }
    }
    samples
}

fn jitter_samples_ms(latency_samples: &[f64]) -> Vec<f64> {
    latency_samples
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).abs())
        .collect()
}

/// Ceil-ordinal percentile: `sorted[ceil(p/100 * n) - 1]`, clamped to a
/// valid index (§4.6).
fn ceil_ordinal_percentile(sorted: &[f64], percentile: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let n = sorted.len() as f64;
    let index = (percentile / 100.0 * n).ceil() as isize - 1;
    let index = index.clamp(0, sorted.len() as isize - 1) as usize;
    sorted[index]
}

fn percentile_summary(samples: &[f64]) -> PercentileSummary {
    if samples.is_empty() {
        return PercentileSummary::default();
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let avg = sorted.iter().sum::<f64>() / sorted.len() as f64;
    PercentileSummary {
        min: sorted[0],
        p5: ceil_ordinal_percentile(&sorted, 5.0),
        avg,
        p95: ceil_ordinal_percentile(&sorted, 95.0),
        max: *sorted.last().unwrap(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProtocolTag;

    fn rtp_packet(frame: u64, ts_ms: u128) -> PacketRecord {
        PacketRecord {
            frame_number: frame,
            timestamp_ns: ts_ms * 1_000_000,
            length: 172,
            src_addr: "10.0.0.1".parse().unwrap(),
            dst_addr: "10.0.0.2".parse().unwrap(),
            src_port: 20000,
            dst_port: 20002,
            protocol: ProtocolTag::Udp,
            app_protocol_hint: Some("rtp".to_string()),
            tcp_flags: None,
            os_fingerprint: None,
            summary: String::new(),
        }
    }

    #[test]
    fn eligibility_covers_sip_and_rtp_ports() {
        let mut packet = rtp_packet(1, 0);
        assert!(is_qos_eligible(&packet));
        packet.src_port = 5060;
        packet.dst_port = 9999;
        assert!(is_qos_eligible(&packet));
        packet.src_port = 9999;
        packet.dst_port = 9998;
        assert!(!is_qos_eligible(&packet));
    }

    #[test]
    fn discards_unrealistic_deltas() {
        let records = vec![&rtp_packet(1, 0), &rtp_packet(2, 6000)];
        let samples = latency_samples_ms(&records);
        assert!(samples.is_empty());
    }

    #[test]
    fn high_latency_flow_flagged_above_threshold() {
        let packets = vec![rtp_packet(1, 0), rtp_packet(2, 200), rtp_packet(3, 400)];
        let result = VoiceQoSExtractor::new().extract(&packets, &PipelineConfig::default());
        assert_eq!(result.high_latency_flows.len(), 1);
    }

    #[test]
    fn ceil_ordinal_percentile_matches_formula() {
        let sorted = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        // ceil(95/100 * 5) - 1 = ceil(4.75) - 1 = 5 - 1 = 4
        assert_eq!(ceil_ordinal_percentile(&sorted, 95.0), 5.0);
    }
}
