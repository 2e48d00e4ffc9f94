use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

use crate::config::PipelineConfig;
use crate::model::{NetworkAnomaly, PacketRecord, Severity};

use super::{anomaly_id, AnomalyDetector};

/// Flags sources contacting more distinct destination ports than
/// `config.port_scan_threshold` (§4.5).
pub struct PortScanDetector;

impl AnomalyDetector for PortScanDetector {
    fn name(&self) -> &'static str {
        "port-scan"
    }

    fn category(&self) -> &'static str {
        "reconnaissance"
    }

    fn detect(&self, packets: &[PacketRecord], config: &PipelineConfig) -> Vec<NetworkAnomaly> {
        let mut ports_by_source: HashMap<IpAddr, HashSet<u16>> = HashMap::new();
        let mut frames_by_source: HashMap<IpAddr, Vec<u64>> = HashMap::new();
        let mut last_ts_by_source: HashMap<IpAddr, u128> = HashMap::new();

        for packet in packets {
            ports_by_source
                .entry(packet.src_addr)
                .or_default()
                .insert(packet.dst_port);
            frames_by_source
                .entry(packet.src_addr)
                .or_default()
                .push(packet.frame_number);
            last_ts_by_source.insert(packet.src_addr, packet.timestamp_ns);
        }

        let mut anomalies = Vec::new();
        let mut ordinal = 0usize;
        let mut sources: Vec<&IpAddr> = ports_by_source.keys().collect();
        sources.sort();
        for src in sources {
            let ports = &ports_by_source[src];
            if ports.len() <= config.port_scan_threshold {
                continue;
            }
            ordinal += 1;
            anomalies.push(NetworkAnomaly {
                id: anomaly_id(self.name(), ordinal),
                detected_at_ns: last_ts_by_source[src],
                severity: Severity::High,
                anomaly_type: "port-scan".to_string(),
                description: format!(
                    "{src} contacted {} distinct destination ports, above the {} port threshold",
                    ports.len(),
                    config.port_scan_threshold
                ),
                src_addr: Some(*src),
                dst_addr: None,
                affected_frames: frames_by_source[src].clone(),
                evidence: format!("distinct_ports={}", ports.len()),
                recommendation: "Investigate the source host for scanning tooling and block if unauthorized.".to_string(),
            });
        }
        anomalies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProtocolTag;

    fn packet(src: &str, dport: u16) -> PacketRecord {
        PacketRecord {
            frame_number: dport as u64,
            timestamp_ns: 0,
            length: 64,
            src_addr: src.parse().unwrap(),
            dst_addr: "10.0.0.1".parse().unwrap(),
            src_port: 5000,
            dst_port: dport,
            protocol: ProtocolTag::Tcp,
            app_protocol_hint: None,
            tcp_flags: None,
            os_fingerprint: None,
            summary: String::new(),
        }
    }

    #[test]
    fn flags_source_above_threshold() {
        let config = PipelineConfig {
            port_scan_threshold: 3,
            ..Default::default()
        };
        let packets: Vec<PacketRecord> = (1..=5).map(|p| packet("10.0.0.9", p)).collect();
        let anomalies = PortScanDetector.detect(&packets, &config);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].severity, Severity::High);
    }

    #[test]
    fn does_not_flag_source_at_or_below_threshold() {
        let config = PipelineConfig {
            port_scan_threshold: 5,
            ..Default::default()
        };
        let packets: Vec<PacketRecord> = (1..=5).map(|p| packet("10.0.0.9", p)).collect();
        let anomalies = PortScanDetector.detect(&packets, &config);
        assert!(anomalies.is_empty());
    }
}
