//! Pipeline configuration (ambient stack: detector thresholds, top-N sizes,
//! progress weights, cache TTLs). Constructible from defaults and
//! overridable by the CLI layer (`clap` flags and/or a TOML file).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunable knobs for the analysis pipeline. All fields have defaults
/// matching the values named in the specification; callers needing
/// different behavior (larger top-N lists, stricter thresholds) construct
/// a custom `PipelineConfig` rather than patching constants in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Entries retained in each top-N statistics list (§4.3).
    pub top_n: usize,
    /// Distinct destination ports that trigger the port-scan detector (§4.5).
    pub port_scan_threshold: usize,
    /// Bytes within the sliding window that trigger the DDoS heuristic (§4.5).
    pub ddos_byte_threshold: u64,
    /// Sliding window for the DDoS heuristic.
    pub ddos_window: Duration,
    /// Conversation byte total that triggers the exfiltration heuristic (§4.5).
    pub exfiltration_byte_threshold: u64,
    /// Standard-deviation multiplier for the size-outlier detector (§4.5).
    pub size_outlier_sigma: f64,
    /// Mean latency above which a VoIP flow is "high-latency" (§4.6).
    pub voip_high_latency_ms: f64,
    /// Mean jitter above which a VoIP flow is "high-jitter" (§4.6).
    pub voip_high_jitter_ms: f64,
    /// Absolute TTL for memoized report-derivation entries (§4.8).
    pub report_cache_ttl: Duration,
    /// Sliding TTL for memoized report-derivation entries (§4.8).
    pub report_cache_sliding_ttl: Duration,
    /// Interval used by `StatisticsEngine::time_series` when the caller
    /// does not specify one.
    pub default_time_series_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_n: 10,
            port_scan_threshold: 50,
            ddos_byte_threshold: 100_000_000,
            ddos_window: Duration::from_secs(10),
            exfiltration_byte_threshold: 100 * 1024 * 1024,
            size_outlier_sigma: 3.0,
            voip_high_latency_ms: 150.0,
            voip_high_jitter_ms: 30.0,
            report_cache_ttl: Duration::from_secs(15 * 60),
            report_cache_sliding_ttl: Duration::from_secs(10 * 60),
            default_time_series_interval: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_specification_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.port_scan_threshold, 50);
        assert_eq!(config.exfiltration_byte_threshold, 100 * 1024 * 1024);
        assert_eq!(config.voip_high_latency_ms, 150.0);
        assert_eq!(config.voip_high_jitter_ms, 30.0);
    }

    #[test]
    fn deserializes_with_partial_overrides() {
        let toml = "top_n = 25\n";
        let config: PipelineConfig = toml::from_str(toml).expect("parse config");
        assert_eq!(config.top_n, 25);
        assert_eq!(config.port_scan_threshold, 50);
    }
}
