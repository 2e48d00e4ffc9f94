//! `ProgressEvent` and the phase labels the coordinator sequences (§3, §4.2).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A named phase owned by `ProgressCoordinator`, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Counting,
    Loading,
    /// Composite of `Statistics` / `Threats` / `VoiceQoS`.
    ParallelAnalysis,
    Finalizing,
    TabLoading,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Counting => "Counting",
            Phase::Loading => "Loading",
            Phase::ParallelAnalysis => "ParallelAnalysis",
            Phase::Finalizing => "Finalizing",
            Phase::TabLoading => "TabLoading",
        }
    }
}

/// The three concurrent producers inside `ParallelAnalysis` (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubPhase {
    Statistics,
    Threats,
    VoiceQoS,
}

impl SubPhase {
    pub fn label(&self) -> &'static str {
        match self {
            SubPhase::Statistics => "Statistics",
            SubPhase::Threats => "Threats",
            SubPhase::VoiceQoS => "VoiceQoS",
        }
    }
}

/// A single progress report emitted to the external sink (§6 "Progress sink").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub phase: Phase,
    /// Integer percent in `[0, 100]`.
    pub percent: u8,
    pub detail: String,
    pub sub_phase: Option<String>,
    pub packets_processed: u64,
    pub packets_expected: u64,
    pub packets_per_second: f64,
    pub threats_detected: u64,
    pub elapsed: Duration,
    pub remaining_estimate: Option<Duration>,
}
