//! Anomaly detector registry and the five representative detectors (§4.5).

mod ddos;
mod exfiltration;
mod port_scan;
mod size_outlier;
mod unencrypted;

pub use ddos::DdosDetector;
pub use exfiltration::ExfiltrationDetector;
pub use port_scan::PortScanDetector;
pub use size_outlier::SizeOutlierDetector;
pub use unencrypted::UnencryptedServiceDetector;

use crate::config::PipelineConfig;
use crate::model::{NetworkAnomaly, PacketRecord};

/// Capability every detector satisfies (§4.5).
pub trait AnomalyDetector: Send + Sync {
    fn name(&self) -> &'static str;
    fn category(&self) -> &'static str;
    fn detect(&self, packets: &[PacketRecord], config: &PipelineConfig) -> Vec<NetworkAnomaly>;
}

/// Optional extension: detectors that only apply to some traces, and that
/// should run in a specific order relative to their peers.
pub trait SpecializedDetector: AnomalyDetector {
    fn can_detect(&self, packets: &[PacketRecord]) -> bool;
    /// Higher runs first.
    fn priority(&self) -> i32;
}

/// Runs every registered detector (respecting `SpecializedDetector`
/// applicability and ordering) and concatenates their findings.
#[derive(Default)]
pub struct DetectorRegistry {
    detectors: Vec<Box<dyn AnomalyDetector>>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, detector: Box<dyn AnomalyDetector>) {
        self.detectors.push(detector);
    }

    /// The standard five-detector registry (§4.5).
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(PortScanDetector));
        registry.register(Box::new(UnencryptedServiceDetector));
        registry.register(Box::new(DdosDetector));
        registry.register(Box::new(ExfiltrationDetector));
        registry.register(Box::new(SizeOutlierDetector));
        registry
    }

    pub fn run(&self, packets: &[PacketRecord], config: &PipelineConfig) -> Vec<NetworkAnomaly> {
        self.detectors
            .iter()
            .flat_map(|d| d.detect(packets, config))
            .collect()
    }
}

/// Deterministic, human-legible anomaly ID: `{detector}-{ordinal}`.
pub(crate) fn anomaly_id(detector: &str, ordinal: usize) -> String {
    format!("{detector}-{ordinal}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    #[test]
    fn standard_registry_tolerates_empty_trace() {
        let registry = DetectorRegistry::standard();
        let anomalies = registry.run(&[], &PipelineConfig::default());
        assert!(anomalies.is_empty());
    }
}
