use crate::config::PipelineConfig;
use crate::model::{NetworkAnomaly, PacketRecord, Severity};

use super::{anomaly_id, AnomalyDetector};

/// Flags packets whose wire length is more than `size_outlier_sigma`
/// standard deviations from the trace's mean length (§4.5).
pub struct SizeOutlierDetector;

impl AnomalyDetector for SizeOutlierDetector {
    fn name(&self) -> &'static str {
        "size-outlier"
    }

    fn category(&self) -> &'static str {
        "anomalous-traffic"
    }

    fn detect(&self, packets: &[PacketRecord], config: &PipelineConfig) -> Vec<NetworkAnomaly> {
        if packets.len() < 2 {
            return Vec::new();
        }

        let n = packets.len() as f64;
        let mean = packets.iter().map(|p| p.length as f64).sum::<f64>() / n;
        let variance = packets
            .iter()
            .map(|p| {
                let delta = p.length as f64 - mean;
                delta * delta
            })
            .sum::<f64>()
            / n;
        let stddev = variance.sqrt();
        if stddev == 0.0 {
            return Vec::new();
        }

        let threshold = config.size_outlier_sigma * stddev;
        let mut anomalies = Vec::new();
        let mut ordinal = 0usize;
        for packet in packets {
            let deviation = (packet.length as f64 - mean).abs();
            if deviation <= threshold {
                continue;
            }
            ordinal += 1;
            anomalies.push(NetworkAnomaly {
                id: anomaly_id(self.name(), ordinal),
                detected_at_ns: packet.timestamp_ns,
                severity: Severity::Low,
                anomaly_type: "size-outlier".to_string(),
                description: format!(
                    "frame {} length {} deviates {:.1} sigma from the trace mean of {:.1}",
                    packet.frame_number,
                    packet.length,
                    deviation / stddev,
                    mean
                ),
                src_addr: Some(packet.src_addr),
                dst_addr: Some(packet.dst_addr),
                affected_frames: vec![packet.frame_number],
                evidence: format!("length={}, mean={:.1}, stddev={:.1}", packet.length, mean, stddev),
                recommendation: "Review the frame for protocol abuse or fragmentation anomalies.".to_string(),
            });
        }
        anomalies
    }
}
