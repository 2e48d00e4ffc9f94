//! Sequences loading, the parallel analysis fan-out, and finalization,
//! writing the result into a session-scoped cache (§4.7).

mod cache;
mod hash;

pub use cache::SessionCache;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::config::PipelineConfig;
use crate::detectors::DetectorRegistry;
use crate::error::PipelineError;
use crate::geo::{GeoBackend, GeoEnricher};
use crate::loader::{CaptureReader, OsFingerprintAccumulator, PacketLoader};
use crate::model::{AnalysisResult, FileMetadata, Phase, ProgressEvent, SubPhase};
use crate::progress::ProgressCoordinator;
use crate::stats::StatisticsEngine;
use crate::voip::VoiceQoSExtractor;

/// Callback the orchestrator drives with every progress report, and the
/// final completion event (§6 "progress sink").
pub trait ProgressSink: Fn(ProgressEvent) + Send + Sync {}
impl<T: Fn(ProgressEvent) + Send + Sync> ProgressSink for T {}

/// Named wall-clock duration for one phase, used to build the timing
/// summary (§4.7 "Emit a multi-line timing summary").
struct PhaseTiming {
    name: &'static str,
    duration: std::time::Duration,
}

/// Cap on distinct IPs the `GeoEnricher` actually resolves per run (§4.4).
const GEO_SAMPLE_SIZE: usize = 256;

/// Drives the full pipeline: load, parallel-analyze, finalize.
pub struct Orchestrator<R, A, B> {
    loader: PacketLoader<R, A>,
    geo: Arc<GeoEnricher<B>>,
    stats_engine: StatisticsEngine,
    detectors: DetectorRegistry,
    voip_extractor: VoiceQoSExtractor,
    config: PipelineConfig,
    cache: SessionCache,
}

impl<R, A, B> Orchestrator<R, A, B>
where
    R: CaptureReader,
    A: OsFingerprintAccumulator,
    B: GeoBackend + 'static,
{
    pub fn new(reader: R, accumulator: A, geo_backend: B, config: PipelineConfig) -> Self {
        Self {
            loader: PacketLoader::new(reader, accumulator),
            geo: Arc::new(GeoEnricher::new(geo_backend)),
            stats_engine: StatisticsEngine::new(),
            detectors: DetectorRegistry::standard(),
            voip_extractor: VoiceQoSExtractor::new(),
            config,
            cache: SessionCache::new(),
        }
    }

    pub async fn analyze(
        &mut self,
        path: &Path,
        progress: &impl ProgressSink,
    ) -> Result<Arc<AnalysisResult>, PipelineError> {
        let absolute_path = std::fs::canonicalize(path)
            .unwrap_or_else(|_| path.to_path_buf())
            .to_string_lossy()
            .to_string();

        let mut timings = Vec::new();
        let expected_bytes = std::fs::metadata(path).map(|m| m.len()).unwrap_or(1);
        let coordinator = Arc::new(ProgressCoordinator::new(expected_bytes));

        // Phase 0: counting. `PacketLoader` estimates the frame count
        // internally before streaming; there is no incremental count to
        // report, so this phase reports as done the moment it starts.
        if let Some(event) = coordinator.report(Phase::Counting, None, 100, "capture size estimated", 0, 0, 0) {
            progress(event);
        }

        // Phase 1: load.
        let load_started = Instant::now();
        let outcome = self
            .loader
            .load(path, &|processed, expected| {
                let pct = if expected > 0 {
                    ((processed as f64 / expected as f64) * 100.0) as u8
                } else {
                    0
                };
                if let Some(event) = coordinator.report(
                    Phase::Loading,
                    None,
                    pct.min(100),
                    format!("{processed} packets loaded"),
                    processed,
                    expected,
                    0,
                ) {
                    progress(event);
                }
            })
            .await
            .map_err(|e| PipelineError::ReaderUnavailable(e.to_string()))?;
        timings.push(PhaseTiming {
            name: "load",
            duration: load_started.elapsed(),
        });

        let truncated = outcome.truncated;
        let packets = Arc::new(outcome.packets);

        // Phase 2: the only fan-out/join in the system. Geo-enrichment rides
        // along inside the statistics subtask rather than running as a
        // fourth sequential step (§4.7, §5).
        let parallel_started = Instant::now();
        let (statistics, (anomalies, threats), voice_qos) = tokio::try_join!(
            self.run_statistics(Arc::clone(&packets), Arc::clone(&self.geo), &coordinator, progress),
            self.run_threats(Arc::clone(&packets), &coordinator, progress),
            self.run_voip(Arc::clone(&packets), &coordinator, progress),
        )?;
        timings.push(PhaseTiming {
            name: "parallel-analysis",
            duration: parallel_started.elapsed(),
        });

        let voice_qos_time_series = Some(self.voip_extractor.time_series(&packets));

        // Phase 3: finalize.
        let finalize_started = Instant::now();
        let path_buf = path.to_path_buf();
        let content_hash = tokio::task::spawn_blocking(move || hash::content_hash_or_fallback(&path_buf))
            .await
            .map_err(|e| PipelineError::OutOfMemory(e.to_string()))?;
        let total_bytes: u64 = packets.iter().map(|p| p.length as u64).sum();
        let file_metadata = FileMetadata {
            path: absolute_path.clone(),
            content_hash: content_hash.clone(),
            analysis_duration: load_started.elapsed(),
            total_packets: packets.len() as u64,
            total_bytes,
            truncated,
        };

        let owned_packets = Arc::try_unwrap(packets).unwrap_or_else(|shared| (*shared).clone());
        let result = Arc::new(AnalysisResult {
            packets: owned_packets,
            statistics,
            threats,
            anomalies,
            voice_qos,
            voice_qos_time_series,
            file_metadata,
        });
        timings.push(PhaseTiming {
            name: "finalize",
            duration: finalize_started.elapsed(),
        });
        if let Some(event) = coordinator.report(Phase::Finalizing, None, 100, "hashing complete", 0, 0, 0) {
            progress(event);
        }

        self.cache
            .insert(absolute_path, content_hash, Arc::clone(&result))
            .await;

        if let Some(event) = coordinator.report(Phase::TabLoading, None, 100, "result ready", 0, 0, 0) {
            progress(event);
        }
        progress(coordinator.mark_complete());

        log_timing_summary(&timings);

        Ok(result)
    }

    /// Computes `NetworkStatistics` and, in the same blocking task,
    /// enriches it with country attribution — geo lookups are blocking I/O
    /// just like the hash, so they ride along here rather than running as
    /// a separate sequential step after the fan-out (§4.4, §4.7, §5).
    async fn run_statistics(
        &self,
        packets: Arc<Vec<crate::model::PacketRecord>>,
        geo: Arc<GeoEnricher<B>>,
        coordinator: &Arc<ProgressCoordinator>,
        progress: &impl ProgressSink,
    ) -> Result<crate::model::NetworkStatistics, PipelineError> {
        if let Some(event) =
            coordinator.report(Phase::ParallelAnalysis, Some(SubPhase::Statistics), 0, "statistics starting", 0, 0, 0)
        {
            progress(event);
        }
        let config = self.config.clone();
        let result = tokio::task::spawn_blocking(move || {
            let engine = StatisticsEngine::new();
            let mut statistics = engine.analyze(&packets, &config);
            geo.enrich(&packets, &mut statistics, GEO_SAMPLE_SIZE);
            statistics
        })
        .await
        .map_err(|e| PipelineError::OutOfMemory(e.to_string()))?;
        if let Some(event) =
            coordinator.report(Phase::ParallelAnalysis, Some(SubPhase::Statistics), 100, "statistics complete", 0, 0, 0)
        {
            progress(event);
        }
        Ok(result)
    }

    async fn run_threats(
        &self,
        packets: Arc<Vec<crate::model::PacketRecord>>,
        coordinator: &Arc<ProgressCoordinator>,
        progress: &impl ProgressSink,
    ) -> Result<(Vec<crate::model::NetworkAnomaly>, Vec<crate::model::SecurityThreat>), PipelineError> {
        if let Some(event) =
            coordinator.report(Phase::ParallelAnalysis, Some(SubPhase::Threats), 0, "threat detectors starting", 0, 0, 0)
        {
            progress(event);
        }
        let config = self.config.clone();
        let (anomalies, threats) = tokio::task::spawn_blocking(move || {
            let registry = DetectorRegistry::standard();
            let anomalies = registry.run(&packets, &config);
            let threats = anomalies.iter().map(crate::model::anomaly_to_threat).collect();
            (anomalies, threats)
        })
        .await
        .map_err(|e| PipelineError::OutOfMemory(e.to_string()))?;
        if let Some(event) = coordinator.report(
            Phase::ParallelAnalysis,
            Some(SubPhase::Threats),
            100,
            "threat detectors complete",
            0,
            0,
            threats.len() as u64,
        ) {
            progress(event);
        }
        Ok((anomalies, threats))
    }

    async fn run_voip(
        &self,
        packets: Arc<Vec<crate::model::PacketRecord>>,
        coordinator: &Arc<ProgressCoordinator>,
        progress: &impl ProgressSink,
    ) -> Result<Option<crate::model::VoiceQoSResult>, PipelineError> {
        if let Some(event) =
            coordinator.report(Phase::ParallelAnalysis, Some(SubPhase::VoiceQoS), 0, "voice QoS starting", 0, 0, 0)
        {
            progress(event);
        }
        let config = self.config.clone();
        let result = tokio::task::spawn_blocking(move || {
            let extractor = VoiceQoSExtractor::new();
            Some(extractor.extract(&packets, &config))
        })
        .await
        .map_err(|e| PipelineError::OutOfMemory(e.to_string()))?;
        if let Some(event) =
            coordinator.report(Phase::ParallelAnalysis, Some(SubPhase::VoiceQoS), 100, "voice QoS complete", 0, 0, 0)
        {
            progress(event);
        }
        Ok(result)
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }
}

/// Logs only phases that took longer than 100ms (§4.7).
fn log_timing_summary(timings: &[PhaseTiming]) {
    let significant: Vec<&PhaseTiming> = timings
        .iter()
        .filter(|t| t.duration > std::time::Duration::from_millis(100))
        .collect();
    if significant.is_empty() {
        return;
    }
    let mut summary = String::from("analysis timing summary:\n");
    for timing in significant {
        summary.push_str(&format!("  {}: {:?}\n", timing.name, timing.duration));
    }
    info!("{}", summary.trim_end());
}

