//! netwatch core library for post-capture network analysis.
//!
//! This crate exposes the analysis pipeline used by the CLI: a
//! `PacketLoader` decodes a capture file into a packet vector, which
//! fans out to `StatisticsEngine`, the `AnomalyDetector` registry, and
//! `VoiceQoSExtractor` in parallel; `Orchestrator` joins their output
//! into an `AnalysisResult` and hands it to `ReportDerivation` on demand.
//!
//! Key guarantees:
//! - `AnalysisResult` is constructed exactly once and never mutated.
//! - Progress flows as a single `ProgressEvent` stream through
//!   `ProgressCoordinator`, independent of which phase produced it.

pub mod config;
pub mod detectors;
pub mod error;
pub mod geo;
pub mod loader;
pub mod model;
pub mod orchestrator;
pub mod progress;
pub mod report;
pub mod stats;
pub mod voip;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use loader::{CaptureReader, OsFingerprintAccumulator, PacketLoader, PcapCaptureReader};
pub use model::{AnalysisResult, ProgressEvent};
pub use orchestrator::{Orchestrator, ProgressSink, SessionCache};
pub use progress::ProgressCoordinator;
pub use report::ReportDerivation;

/// Current analysis-result schema version.
pub const ANALYSIS_SCHEMA_VERSION: u32 = 1;
