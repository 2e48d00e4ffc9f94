use std::collections::HashMap;
use std::net::IpAddr;

use crate::config::PipelineConfig;
use crate::model::{NetworkAnomaly, PacketRecord, Severity};
use crate::stats::is_internal_address;

use super::{anomaly_id, AnomalyDetector};

/// Flags conversations whose total byte volume exceeds
/// `exfiltration_byte_threshold` toward a non-private destination (§4.5).
pub struct ExfiltrationDetector;

impl AnomalyDetector for ExfiltrationDetector {
    fn name(&self) -> &'static str {
        "exfiltration-heuristic"
    }

    fn category(&self) -> &'static str {
        "data-loss"
    }

    fn detect(&self, packets: &[PacketRecord], config: &PipelineConfig) -> Vec<NetworkAnomaly> {
        #[derive(Default)]
        struct Conversation {
            bytes: u64,
            frames: Vec<u64>,
            last_ts: u128,
        }
        let mut by_pair: HashMap<(IpAddr, IpAddr), Conversation> = HashMap::new();
        for packet in packets {
            if is_internal_address(packet.dst_addr) {
                continue;
            }
            let entry = by_pair.entry((packet.src_addr, packet.dst_addr)).or_default();
            entry.bytes += packet.length as u64;
            entry.frames.push(packet.frame_number);
            entry.last_ts = entry.last_ts.max(packet.timestamp_ns);
        }

        let mut anomalies = Vec::new();
        let mut ordinal = 0usize;
        let mut pairs: Vec<&(IpAddr, IpAddr)> = by_pair.keys().collect();
        pairs.sort();
        for pair in pairs {
            let conversation = &by_pair[pair];
            if conversation.bytes <= config.exfiltration_byte_threshold {
                continue;
            }
            ordinal += 1;
            anomalies.push(NetworkAnomaly {
                id: anomaly_id(self.name(), ordinal),
                detected_at_ns: conversation.last_ts,
                severity: Severity::High,
                anomaly_type: "exfiltration-heuristic".to_string(),
                description: format!(
                    "{} sent {} bytes to external host {}, above the {} byte threshold",
                    pair.0, conversation.bytes, pair.1, config.exfiltration_byte_threshold
                ),
                src_addr: Some(pair.0),
                dst_addr: Some(pair.1),
                affected_frames: conversation.frames.clone(),
                evidence: format!("total_bytes={}", conversation.bytes),
                recommendation: "Review the destination and payload for unauthorized data transfer.".to_string(),
            });
        }
        anomalies
    }
}
