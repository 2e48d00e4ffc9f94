//! `SecurityFinding` and the remediation plan it feeds into (§4.8).

use serde::{Deserialize, Serialize};

use super::threat::Severity;

/// A grouped, report-facing write-up of every threat sharing a type (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityFinding {
    pub threat_type: String,
    pub severity: Severity,
    pub description: String,
    pub technical_detail: String,
    pub impact: String,
    pub root_cause: String,
    /// First five threat instances of this type, by ID.
    pub evidence: Vec<String>,
    pub affected_systems: Vec<String>,
    pub remediation_step: String,
    /// 0-100, capped.
    pub risk_score: u32,
    pub occurrence_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RemediationPriority {
    Critical,
    Hardening,
    LongTerm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationTask {
    pub title: String,
    pub priority: RemediationPriority,
    pub related_threat_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationPhase {
    pub priority: RemediationPriority,
    pub window_days: (u32, u32),
    pub tasks: Vec<RemediationTask>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationPlan {
    pub phases: Vec<RemediationPhase>,
    pub resources: Vec<String>,
    pub total_cost_estimate_usd: u64,
    pub dependency_notes: Vec<String>,
    pub success_criteria: Vec<String>,
}
