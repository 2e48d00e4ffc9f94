//! `NetworkAnomaly` / `SecurityThreat` and the projection between them
//! (§3, §4.5, §8 invariant 5).

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Shared severity scale for anomalies and threats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        };
        f.write_str(s)
    }
}

/// A heuristic-detected anomaly in the packet sequence, produced by one
/// `AnomalyDetector`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkAnomaly {
    pub id: String,
    pub detected_at_ns: u128,
    pub severity: Severity,
    pub anomaly_type: String,
    pub description: String,
    pub src_addr: Option<IpAddr>,
    pub dst_addr: Option<IpAddr>,
    pub affected_frames: Vec<u64>,
    pub evidence: String,
    pub recommendation: String,
}

/// Consumer-facing projection of a `NetworkAnomaly`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityThreat {
    pub id: String,
    pub detected_at_ns: u128,
    pub severity: Severity,
    pub threat_type: String,
    pub description: String,
    pub src_addr: Option<IpAddr>,
    pub dst_addr: Option<IpAddr>,
    pub affected_frames: Vec<u64>,
    pub evidence: String,
    pub recommendation: String,
    pub is_false_positive: bool,
}

/// The single, total projection from anomaly to threat (§4.5, §8 invariant 5).
///
/// Severity maps identity; every field carries over verbatim except
/// `is_false_positive`, which always starts `false`.
pub fn anomaly_to_threat(anomaly: &NetworkAnomaly) -> SecurityThreat {
    SecurityThreat {
        id: anomaly.id.clone(),
        detected_at_ns: anomaly.detected_at_ns,
        severity: anomaly.severity,
        threat_type: anomaly.anomaly_type.clone(),
        description: anomaly.description.clone(),
        src_addr: anomaly.src_addr,
        dst_addr: anomaly.dst_addr,
        affected_frames: anomaly.affected_frames.clone(),
        evidence: anomaly.evidence.clone(),
        recommendation: anomaly.recommendation.clone(),
        is_false_positive: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_anomaly() -> NetworkAnomaly {
        NetworkAnomaly {
            id: "anomaly-1".to_string(),
            detected_at_ns: 0,
            severity: Severity::High,
            anomaly_type: "port-scan".to_string(),
            description: "60 distinct destination ports".to_string(),
            src_addr: Some("10.0.0.5".parse().unwrap()),
            dst_addr: Some("192.168.1.10".parse().unwrap()),
            affected_frames: vec![1, 2, 3],
            evidence: "ports=60".to_string(),
            recommendation: "investigate source".to_string(),
        }
    }

    #[test]
    fn projection_preserves_fields_and_clears_false_positive() {
        let anomaly = sample_anomaly();
        let threat = anomaly_to_threat(&anomaly);

        assert_eq!(threat.id, anomaly.id);
        assert_eq!(threat.severity, anomaly.severity);
        assert_eq!(threat.threat_type, anomaly.anomaly_type);
        assert_eq!(threat.affected_frames, anomaly.affected_frames);
        assert!(!threat.is_false_positive);
    }

    #[test]
    fn severity_ordering_is_monotonic() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }
}
