use std::collections::HashMap;
use std::net::IpAddr;

use crate::config::PipelineConfig;
use crate::model::{NetworkAnomaly, PacketRecord, Severity};

use super::{anomaly_id, AnomalyDetector};

/// Flags a destination whose traffic volume exceeds `ddos_byte_threshold`
/// within any `ddos_window`-wide sliding window (§4.5).
pub struct DdosDetector;

impl AnomalyDetector for DdosDetector {
    fn name(&self) -> &'static str {
        "ddos-heuristic"
    }

    fn category(&self) -> &'static str {
        "availability"
    }

    fn detect(&self, packets: &[PacketRecord], config: &PipelineConfig) -> Vec<NetworkAnomaly> {
        let window_ns = config.ddos_window.as_nanos();
        if window_ns == 0 {
            return Vec::new();
        }

        let mut by_dest: HashMap<IpAddr, Vec<&PacketRecord>> = HashMap::new();
        for packet in packets {
            by_dest.entry(packet.dst_addr).or_default().push(packet);
        }

        let mut anomalies = Vec::new();
        let mut ordinal = 0usize;
        let mut dests: Vec<&IpAddr> = by_dest.keys().collect();
        dests.sort();
        for dst in dests {
            let mut frames = by_dest[dst].clone();
            frames.sort_by_key(|p| p.timestamp_ns);

            let mut window_start = 0usize;
            let mut window_bytes = 0u64;
            let mut peak_bytes = 0u64;
            let mut peak_frames: Vec<u64> = Vec::new();
            let mut peak_ts = 0u128;

            for end in 0..frames.len() {
                window_bytes += frames[end].length as u64;
                while frames[end].timestamp_ns.saturating_sub(frames[window_start].timestamp_ns) > window_ns {
                    window_bytes -= frames[window_start].length as u64;
                    window_start += 1;
                }
                if window_bytes > peak_bytes {
                    peak_bytes = window_bytes;
                    peak_frames = frames[window_start..=end].iter().map(|p| p.frame_number).collect();
                    peak_ts = frames[end].timestamp_ns;
                }
            }

            if peak_bytes > config.ddos_byte_threshold {
                ordinal += 1;
                anomalies.push(NetworkAnomaly {
                    id: anomaly_id(self.name(), ordinal),
                    detected_at_ns: peak_ts,
                    severity: Severity::Critical,
                    anomaly_type: "ddos-heuristic".to_string(),
                    description: format!(
                        "{dst} received {peak_bytes} bytes within a {:?} window, above the {} byte threshold",
                        config.ddos_window, config.ddos_byte_threshold
                    ),
                    src_addr: None,
                    dst_addr: Some(**dst),
                    affected_frames: peak_frames,
                    evidence: format!("window_bytes={peak_bytes}"),
                    recommendation: "Engage upstream rate limiting or scrubbing for this destination.".to_string(),
                });
            }
        }
        anomalies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProtocolTag;
    use std::time::Duration;

    fn packet(ts_ns: u128, len: u16) -> PacketRecord {
        PacketRecord {
            frame_number: (ts_ns + 1) as u64,
            timestamp_ns: ts_ns,
            length: len,
            src_addr: "10.0.0.1".parse().unwrap(),
            dst_addr: "10.0.0.2".parse().unwrap(),
            src_port: 1,
            dst_port: 2,
            protocol: ProtocolTag::Udp,
            app_protocol_hint: None,
            tcp_flags: None,
            os_fingerprint: None,
            summary: String::new(),
        }
    }

    #[test]
    fn flags_burst_above_threshold_within_window() {
        let config = PipelineConfig {
            ddos_byte_threshold: 100,
            ddos_window: Duration::from_secs(1),
            ..Default::default()
        };
        let packets = vec![packet(0, 60), packet(100_000_000, 60)];
        let anomalies = DdosDetector.detect(&packets, &config);
        assert_eq!(anomalies.len(), 1);
    }

    #[test]
    fn does_not_flag_traffic_spread_beyond_window() {
        let config = PipelineConfig {
            ddos_byte_threshold: 100,
            ddos_window: Duration::from_secs(1),
            ..Default::default()
        };
        let packets = vec![packet(0, 60), packet(5_000_000_000, 60)];
        let anomalies = DdosDetector.detect(&packets, &config);
        assert!(anomalies.is_empty());
    }
}
