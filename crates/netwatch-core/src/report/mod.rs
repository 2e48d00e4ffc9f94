//! Report derivation: findings, remediation planning, and the memoized
//! layer wrapping both (§4.8).

mod findings;
mod memoize;
mod remediation;

pub use findings::FindingsGenerator;
pub use memoize::{CachePriority, MemoizedCache, memoized_or_compute};
pub use remediation::RemediationPlanner;

use crate::config::PipelineConfig;
use crate::model::{
    FindingKey, NetworkStatistics, PlanKey, RemediationPlan, SecurityFinding, SecurityThreat,
    digest_inputs,
};

/// Rough byte-size estimate used by the memoization layer's eviction
/// policy; findings/plans are small, so a flat estimate is adequate.
const ESTIMATED_ENTRY_SIZE: usize = 2048;

/// Wraps `FindingsGenerator` and `RemediationPlanner` behind digest-keyed
/// memoized caches (§4.8 "Memoization").
pub struct ReportDerivation {
    findings_generator: FindingsGenerator,
    remediation_planner: RemediationPlanner,
    findings_cache: MemoizedCache<FindingKey, Vec<SecurityFinding>>,
    plan_cache: MemoizedCache<PlanKey, RemediationPlan>,
}

impl ReportDerivation {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            findings_generator: FindingsGenerator::new(),
            remediation_planner: RemediationPlanner::new(),
            findings_cache: MemoizedCache::new(
                config.report_cache_ttl,
                config.report_cache_sliding_ttl,
                64 * ESTIMATED_ENTRY_SIZE,
            ),
            plan_cache: MemoizedCache::new(
                config.report_cache_ttl,
                config.report_cache_sliding_ttl,
                64 * ESTIMATED_ENTRY_SIZE,
            ),
        }
    }

    pub fn findings(&self, statistics: &NetworkStatistics, threats: &[SecurityThreat]) -> Vec<SecurityFinding> {
        let key = FindingKey(digest_inputs(statistics, threats));
        memoized_or_compute(&self.findings_cache, key, CachePriority::Normal, ESTIMATED_ENTRY_SIZE, || {
            self.findings_generator.generate(statistics, threats)
        })
    }

    pub fn remediation_plan(
        &self,
        statistics: &NetworkStatistics,
        threats: &[SecurityThreat],
        findings: &[SecurityFinding],
    ) -> RemediationPlan {
        let key = PlanKey(digest_inputs(statistics, threats));
        memoized_or_compute(&self.plan_cache, key, CachePriority::Normal, ESTIMATED_ENTRY_SIZE, || {
            self.remediation_planner.plan(findings)
        })
    }
}
