//! `AnalysisResult`: the complete, cacheable pipeline artifact (§3).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::packet::PacketRecord;
use super::stats::NetworkStatistics;
use super::threat::{NetworkAnomaly, SecurityThreat};
use super::voip::{VoiceQoSResult, VoiceQoSTimeSeries};

/// File-level metadata carried alongside the analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    pub path: String,
    /// Hex-encoded SHA-256 of the capture file, or a random fallback
    /// identifier if hashing failed (§7 `HashIoError`).
    pub content_hash: String,
    pub analysis_duration: Duration,
    pub total_packets: u64,
    pub total_bytes: u64,
    /// Set when the capture stream ended before EOF (§7 `ReaderTruncated`).
    pub truncated: bool,
}

/// The complete, cacheable analysis artifact (§3 `AnalysisResult`).
///
/// Constructed exactly once at the end of a successful pipeline run and
/// never mutated afterward; the session cache hands out `Arc<AnalysisResult>`
/// so this invariant holds for every caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub packets: Vec<PacketRecord>,
    pub statistics: NetworkStatistics,
    pub threats: Vec<SecurityThreat>,
    pub anomalies: Vec<NetworkAnomaly>,
    pub voice_qos: Option<VoiceQoSResult>,
    pub voice_qos_time_series: Option<VoiceQoSTimeSeries>,
    pub file_metadata: FileMetadata,
}
