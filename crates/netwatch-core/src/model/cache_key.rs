//! Content-addressed cache keys for the report-derivation layer (§3, §4.8).

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::stats::NetworkStatistics;
use super::threat::SecurityThreat;

/// Stable digest of the inputs to a memoized derivation, per §8 invariant 7:
/// identical inputs must hash to an identical key within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FindingKey(pub u64);

/// Same shape as `FindingKey`, scoped to `RemediationPlanner` inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanKey(pub u64);

/// Digest the inputs `FindingsGenerator` and `RemediationPlanner` consume:
/// counts by severity/category, conversation count, and the top-port tuple.
/// Both cache keys are derived from this same digest function (§4.8).
pub fn digest_inputs(statistics: &NetworkStatistics, threats: &[SecurityThreat]) -> u64 {
    let mut hasher = DefaultHasher::new();

    let mut severity_counts = std::collections::HashMap::new();
    for threat in threats {
        *severity_counts
            .entry(threat.severity.to_string())
            .or_insert(0usize) += 1;
    }
    let mut by_severity: Vec<(String, usize)> = severity_counts.into_iter().collect();
    by_severity.sort();
    by_severity.hash(&mut hasher);

    let mut by_category: Vec<(String, usize)> = {
        let mut counts = std::collections::HashMap::new();
        for threat in threats {
            *counts.entry(threat.threat_type.clone()).or_insert(0usize) += 1;
        }
        counts.into_iter().collect()
    };
    by_category.sort();
    by_category.hash(&mut hasher);

    statistics.top_conversations.len().hash(&mut hasher);

    let mut top_ports: Vec<u16> = statistics.top_ports.iter().map(|p| p.port).collect();
    top_ports.sort_unstable();
    top_ports.hash(&mut hasher);

    threats.len().hash(&mut hasher);

    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::stats::{ConversationStat, NetworkStatistics, PortStat};
    use crate::model::threat::Severity;
    use crate::model::packet::ProtocolTag;

    fn threat(severity: Severity, kind: &str) -> SecurityThreat {
        SecurityThreat {
            id: "t".to_string(),
            detected_at_ns: 0,
            severity,
            threat_type: kind.to_string(),
            description: String::new(),
            src_addr: None,
            dst_addr: None,
            affected_frames: vec![],
            evidence: String::new(),
            recommendation: String::new(),
            is_false_positive: false,
        }
    }

    fn stats_with_ports(ports: &[u16]) -> NetworkStatistics {
        let mut stats = NetworkStatistics::default();
        stats.top_ports = ports
            .iter()
            .map(|&port| PortStat {
                port,
                packet_count: 1,
                byte_count: 1,
            })
            .collect();
        stats.top_conversations = vec![ConversationStat {
            src_addr: "10.0.0.1".parse().unwrap(),
            src_port: 1,
            dst_addr: "10.0.0.2".parse().unwrap(),
            dst_port: 2,
            protocol: ProtocolTag::Tcp,
            packet_count: 1,
            byte_count: 1,
            cross_border: false,
        }];
        stats
    }

    #[test]
    fn same_inputs_hash_identically() {
        let threats = vec![threat(Severity::High, "port-scan")];
        let stats = stats_with_ports(&[80, 443]);

        let digest_a = digest_inputs(&stats, &threats);
        let digest_b = digest_inputs(&stats, &threats);
        assert_eq!(digest_a, digest_b);
    }

    #[test]
    fn differing_inputs_hash_differently() {
        let stats = stats_with_ports(&[80, 443]);
        let a = digest_inputs(&stats, &[threat(Severity::High, "port-scan")]);
        let b = digest_inputs(&stats, &[threat(Severity::Critical, "port-scan")]);
        assert_ne!(a, b);
    }
}
