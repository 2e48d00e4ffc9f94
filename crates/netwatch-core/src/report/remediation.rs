//! Builds a phased remediation plan from findings (§4.8).

use crate::model::{
    RemediationPhase, RemediationPlan, RemediationPriority, RemediationTask, SecurityFinding,
    Severity,
};

const HOURS_PER_TASK: u64 = 6;
const HOURLY_RATE_USD: u64 = 150;
const SOFTWARE_FLAT_FEE_USD: u64 = 10_000;

fn priority_for(severity: Severity) -> RemediationPriority {
    match severity {
        Severity::Critical | Severity::High => RemediationPriority::Critical,
        Severity::Medium => RemediationPriority::Hardening,
        Severity::Low => RemediationPriority::LongTerm,
    }
}

fn window_for(priority: RemediationPriority) -> (u32, u32) {
    match priority {
        RemediationPriority::Critical => (0, 7),
        RemediationPriority::Hardening => (8, 30),
        RemediationPriority::LongTerm => (31, 90),
    }
}

/// Produces a three-phase remediation plan (§4.8).
pub struct RemediationPlanner;

impl RemediationPlanner {
    pub fn new() -> Self {
        Self
    }

    pub fn plan(&self, findings: &[SecurityFinding]) -> RemediationPlan {
        let mut tasks: Vec<RemediationTask> = findings
            .iter()
            .map(|finding| RemediationTask {
                title: finding.remediation_step.clone(),
                priority: priority_for(finding.severity),
                related_threat_type: finding.threat_type.clone(),
            })
            .collect();
        tasks.sort_by_key(|t| t.priority);

        let phases: Vec<RemediationPhase> = [
            RemediationPriority::Critical,
            RemediationPriority::Hardening,
            RemediationPriority::LongTerm,
        ]
        .into_iter()
        .map(|priority| RemediationPhase {
            priority,
            window_days: window_for(priority),
            tasks: tasks
                .iter()
                .filter(|t| t.priority == priority)
                .cloned()
                .collect(),
        })
        .collect();

        let total_cost_estimate_usd = cost_estimate(tasks.len() as u64);

        RemediationPlan {
            phases,
            resources: default_resources(),
            total_cost_estimate_usd,
            dependency_notes: vec![
                "Critical fixes should land before hardening work begins on shared systems."
                    .to_string(),
            ],
            success_criteria: vec![
                "No Critical or High severity findings remain unresolved after 30 days."
                    .to_string(),
                "All newly hardened services pass a follow-up scan with zero regressions."
                    .to_string(),
            ],
        }
    }
}

/// `tasks · 6h · $150 + $10,000 software`, bucketed to the nearest $1,000
/// (§4.8 "rough formula").
fn cost_estimate(task_count: u64) -> u64 {
    let labor = task_count * HOURS_PER_TASK * HOURLY_RATE_USD;
    let total = labor + SOFTWARE_FLAT_FEE_USD;
    (total / 1000) * 1000
}

fn default_resources() -> Vec<String> {
    vec![
        "Security engineer (remediation lead)".to_string(),
        "Network operations on-call".to_string(),
        "Vulnerability scanning tooling budget".to_string(),
    ]
}
