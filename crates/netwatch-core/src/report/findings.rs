//! Groups threats into report-facing findings with a risk score (§4.8).

use std::collections::HashMap;

use crate::model::{NetworkStatistics, SecurityFinding, SecurityThreat, Severity};

const EVIDENCE_LIMIT: usize = 5;

fn base_score(severity: Severity) -> u32 {
    match severity {
        Severity::Low => 10,
        Severity::Medium => 30,
        Severity::High => 60,
        Severity::Critical => 85,
    }
}

/// Risk score formula (§4.8): `base(severity) + 10·(affected>10) +
/// 5·(affected>5) + 10·(occurrences>100) + 5·(occurrences>50)`, capped
/// at 100.
fn risk_score(severity: Severity, affected_systems: usize, occurrences: usize) -> u32 {
    let mut score = base_score(severity);
    if affected_systems > 10 {
        score += 10;
    }
    if affected_systems > 5 {
        score += 5;
    }
    if occurrences > 100 {
        score += 10;
    }
    if occurrences > 50 {
        score += 5;
    }
    score.min(100)
}

fn impact_for(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => "Limited operational impact if left unaddressed.",
        Severity::Medium => "Moderate risk of exposure or service disruption.",
        Severity::High => "Significant risk of compromise or data loss.",
        Severity::Critical => "Severe risk of breach, requiring immediate action.",
    }
}

/// Groups threats by type and composes a `SecurityFinding` per group.
pub struct FindingsGenerator;

impl FindingsGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, statistics: &NetworkStatistics, threats: &[SecurityThreat]) -> Vec<SecurityFinding> {
        let _ = statistics;
        let mut by_type: HashMap<&str, Vec<&SecurityThreat>> = HashMap::new();
        for threat in threats {
            by_type.entry(threat.threat_type.as_str()).or_default().push(threat);
        }

        let mut types: Vec<&str> = by_type.keys().copied().collect();
        types.sort();

        types
            .into_iter()
            .map(|threat_type| {
                let group = &by_type[threat_type];
                let severity = group.iter().map(|t| t.severity).max().unwrap_or(Severity::Low);
                let affected_systems: Vec<String> = {
                    let mut systems: std::collections::HashSet<String> = std::collections::HashSet::new();
                    for threat in group {
                        if let Some(src) = threat.src_addr {
                            systems.insert(src.to_string());
                        }
                        if let Some(dst) = threat.dst_addr {
                            systems.insert(dst.to_string());
                        }
                    }
                    let mut systems: Vec<String> = systems.into_iter().collect();
                    systems.sort();
                    systems
                };

                SecurityFinding {
                    threat_type: threat_type.to_string(),
                    severity,
                    description: format!(
                        "{} instance(s) of {threat_type} detected across {} system(s).",
                        group.len(),
                        affected_systems.len()
                    ),
                    technical_detail: group
                        .first()
                        .map(|t| t.evidence.clone())
                        .unwrap_or_default(),
                    impact: impact_for(severity).to_string(),
                    root_cause: group
                        .first()
                        .map(|t| t.description.clone())
                        .unwrap_or_default(),
                    evidence: group.iter().take(EVIDENCE_LIMIT).map(|t| t.id.clone()).collect(),
                    affected_systems: affected_systems.clone(),
                    remediation_step: group
                        .first()
                        .map(|t| t.recommendation.clone())
                        .unwrap_or_default(),
                    risk_score: risk_score(severity, affected_systems.len(), group.len()),
                    occurrence_count: group.len(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NetworkStatistics;

    fn threat(severity: Severity, kind: &str) -> SecurityThreat {
        SecurityThreat {
            id: format!("{kind}-1"),
            detected_at_ns: 0,
            severity,
            threat_type: kind.to_string(),
            description: "desc".to_string(),
            src_addr: Some("10.0.0.1".parse().unwrap()),
            dst_addr: Some("10.0.0.2".parse().unwrap()),
            affected_frames: vec![1],
            evidence: "ev".to_string(),
            recommendation: "fix it".to_string(),
            is_false_positive: false,
        }
    }

    #[test]
    fn risk_score_escalates_with_affected_count_and_occurrences() {
        assert_eq!(risk_score(Severity::Low, 0, 0), 10);
        assert_eq!(risk_score(Severity::Low, 11, 0), 25);
        assert_eq!(risk_score(Severity::Critical, 11, 101), 100);
    }

    #[test]
    fn groups_threats_by_type_and_caps_evidence() {
        let threats: Vec<SecurityThreat> = (0..8).map(|_| threat(Severity::High, "port-scan")).collect();
        let findings = FindingsGenerator::new().generate(&NetworkStatistics::default(), &threats);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].evidence.len(), 5);
        assert_eq!(findings[0].occurrence_count, 8);
    }
}
