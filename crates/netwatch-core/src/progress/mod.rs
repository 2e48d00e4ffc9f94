//! Merges progress from every pipeline phase into one external event
//! stream (§4.2).

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::model::{Phase, ProgressEvent, SubPhase};

const WEIGHT_COUNTING: u8 = 5;
const WEIGHT_LOADING: u8 = 50;
const WEIGHT_PARALLEL: u8 = 18;
const WEIGHT_FINALIZING: u8 = 2;
const WEIGHT_TAB_LOADING: u8 = 25;

const DEBOUNCE: Duration = Duration::from_millis(150);
const ETA_CAP: Duration = Duration::from_secs(2 * 60 * 60);
const ETA_MIN_PERCENT: u8 = 3;
const ETA_MIN_ELAPSED: Duration = Duration::from_secs(1);

fn phase_weight(phase: Phase) -> u8 {
    match phase {
        Phase::Counting => WEIGHT_COUNTING,
        Phase::Loading => WEIGHT_LOADING,
        Phase::ParallelAnalysis => WEIGHT_PARALLEL,
        Phase::Finalizing => WEIGHT_FINALIZING,
        Phase::TabLoading => WEIGHT_TAB_LOADING,
    }
}

/// Disjoint `[start, end]` percent interval a phase owns, derived by
/// prefix-summing the phase weights in declaration order.
fn phase_interval(phase: Phase) -> (u8, u8) {
    let order = [
        Phase::Counting,
        Phase::Loading,
        Phase::ParallelAnalysis,
        Phase::Finalizing,
        Phase::TabLoading,
    ];
    let mut start = 0u32;
    for p in order {
        let weight = phase_weight(p) as u32;
        if p == phase {
            return (start as u8, (start + weight) as u8);
        }
        start += weight;
    }
    unreachable!("phase_interval called with an unlisted phase")
}

/// Whether a phase runs several concurrent sub-producers (`ParallelAnalysis`)
/// or a single sequential stream. Smoothing direction depends on this
/// (§4.2 "Hybrid smoothing").
fn is_parallel_phase(phase: Phase) -> bool {
    matches!(phase, Phase::ParallelAnalysis)
}

struct CoordinatorState {
    started_at: Instant,
    high_water_mark: u8,
    last_emit_at: Instant,
    last_emit_percent: u8,
    completed: bool,
    sub_phase_percents: (u8, u8, u8), // (statistics, threats, voiceqos)
    expected_bytes: u64,
}

/// Tracks and smooths progress across the six named phases, emitting a
/// single externally-consumed `ProgressEvent` stream.
pub struct ProgressCoordinator {
    state: Mutex<CoordinatorState>,
}

impl ProgressCoordinator {
    pub fn new(expected_bytes: u64) -> Self {
        let now = Instant::now();
        Self {
            state: Mutex::new(CoordinatorState {
                started_at: now,
                high_water_mark: 0,
                last_emit_at: now,
                last_emit_percent: 0,
                completed: false,
                sub_phase_percents: (0, 0, 0),
                expected_bytes: expected_bytes.max(1),
            }),
        }
    }

    /// Reports a raw 0–100 percent within `phase` (and, for
    /// `ParallelAnalysis`, which sub-phase it belongs to). Returns the
    /// externally-facing event, or `None` if the report was debounced.
    pub fn report(
        &self,
        phase: Phase,
        sub_phase: Option<SubPhase>,
        raw_percent: u8,
        detail: impl Into<String>,
        packets_processed: u64,
        packets_expected: u64,
        threats_detected: u64,
    ) -> Option<ProgressEvent> {
        let mut state = self.state.lock().unwrap();
        if state.completed {
            return None;
        }

        let raw_percent = raw_percent.min(100);
        let time_estimate = Self::time_based_estimate(&state);
        let smoothed = if is_parallel_phase(phase) {
            raw_percent.max(time_estimate)
        } else {
            raw_percent.min(time_estimate)
        };

        if let Some(sub) = sub_phase {
            Self::update_sub_phase(&mut state, sub, smoothed);
        }

        let phase_local = if phase == Phase::ParallelAnalysis {
            Self::aggregate_parallel(&state)
        } else {
            smoothed
        };

        let (start, end) = phase_interval(phase);
        let span = (end - start) as u32;
        let global = start as u32 + (phase_local as u32 * span / 100);
        let global = global.min(100) as u8;

        let clamped = global.max(state.high_water_mark);
        let now = Instant::now();
        let elapsed_since_last = now.duration_since(state.last_emit_at);
        let improved_enough = clamped >= state.last_emit_percent.saturating_add(1);
        if !improved_enough && elapsed_since_last < DEBOUNCE && clamped != 100 {
            return None;
        }

        state.high_water_mark = clamped;
        state.last_emit_at = now;
        state.last_emit_percent = clamped;

        let elapsed = now.duration_since(state.started_at);
        let remaining_estimate = Self::eta(elapsed, clamped);
        let packets_per_second = if elapsed.as_secs_f64() > 0.0 {
            packets_processed as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        Some(ProgressEvent {
            phase,
            percent: clamped,
            detail: detail.into(),
            sub_phase: sub_phase.map(|s| s.label().to_string()),
            packets_processed,
            packets_expected,
            packets_per_second,
            threats_detected,
            elapsed,
            remaining_estimate,
        })
    }

    /// Forces the stream to 100% and freezes it; subsequent `report` calls
    /// below 100 are dropped (§4.2 "Monotonicity and debouncing").
    pub fn mark_complete(&self) -> ProgressEvent {
        let mut state = self.state.lock().unwrap();
        state.high_water_mark = 100;
        state.last_emit_percent = 100;
        state.completed = true;
        let elapsed = Instant::now().duration_since(state.started_at);
        ProgressEvent {
            phase: Phase::TabLoading,
            percent: 100,
            detail: "complete".to_string(),
            sub_phase: None,
            packets_processed: 0,
            packets_expected: 0,
            packets_per_second: 0.0,
            threats_detected: 0,
            elapsed,
            remaining_estimate: None,
        }
    }

    fn update_sub_phase(state: &mut CoordinatorState, sub: SubPhase, percent: u8) {
        let (stats, threats, voip) = &mut state.sub_phase_percents;
        match sub {
            SubPhase::Statistics => *stats = percent,
            SubPhase::Threats => *threats = percent,
            SubPhase::VoiceQoS => *voip = percent,
        }
    }

    fn aggregate_parallel(state: &CoordinatorState) -> u8 {
        let (stats, threats, voip) = state.sub_phase_percents;
        if stats == 100 && threats == 100 && voip == 100 {
            return 100;
        }
        let weighted = 0.50 * stats as f64 + 0.40 * threats as f64 + 0.10 * voip as f64;
        weighted.round().clamp(0.0, 100.0) as u8
    }

    /// Crude file-size-scaled time estimate used purely to bound smoothing;
    /// not exposed externally.
    fn time_based_estimate(state: &CoordinatorState) -> u8 {
        let elapsed = state.started_at.elapsed().as_secs_f64();
        let assumed_total_secs = (state.expected_bytes as f64 / 50_000_000.0).max(1.0);
        ((elapsed / assumed_total_secs) * 100.0).clamp(0.0, 100.0) as u8
    }

    fn eta(elapsed: Duration, percent: u8) -> Option<Duration> {
        if percent < ETA_MIN_PERCENT || elapsed < ETA_MIN_ELAPSED {
            return None;
        }
        let total = elapsed.as_secs_f64() / percent as f64 * 100.0;
        let remaining = (total - elapsed.as_secs_f64()).max(0.0);
        let remaining = Duration::from_secs_f64(remaining).min(ETA_CAP);
        Some(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_intervals_are_disjoint_and_sum_to_100() {
        let order = [
            Phase::Counting,
            Phase::Loading,
            Phase::ParallelAnalysis,
            Phase::Finalizing,
            Phase::TabLoading,
        ];
        let mut expected_start = 0u8;
        for phase in order {
            let (start, end) = phase_interval(phase);
            assert_eq!(start, expected_start);
            expected_start = end;
        }
        assert_eq!(expected_start, 100);
    }

    #[test]
    fn monotonicity_clamps_regressions() {
        let coordinator = ProgressCoordinator::new(1_000_000);
        let first = coordinator
            .report(Phase::Loading, None, 50, "loading", 500, 1000, 0)
            .unwrap();
        assert!(first.percent >= 5);
        std::thread::sleep(Duration::from_millis(200));
        let second = coordinator
            .report(Phase::Loading, None, 10, "loading", 100, 1000, 0)
            .unwrap();
        assert!(second.percent >= first.percent);
    }

    #[test]
    fn mark_complete_freezes_stream() {
        let coordinator = ProgressCoordinator::new(1_000_000);
        coordinator.mark_complete();
        let after = coordinator.report(Phase::TabLoading, None, 50, "x", 0, 0, 0);
        assert!(after.is_none());
    }

    #[test]
    fn parallel_aggregation_snaps_to_100_when_all_subphases_complete() {
        let coordinator = ProgressCoordinator::new(1_000_000);
        coordinator.report(Phase::ParallelAnalysis, Some(SubPhase::Statistics), 100, "s", 0, 0, 0);
        coordinator.report(Phase::ParallelAnalysis, Some(SubPhase::Threats), 100, "t", 0, 0, 0);
        let last = coordinator
            .report(Phase::ParallelAnalysis, Some(SubPhase::VoiceQoS), 100, "v", 0, 0, 0)
            .unwrap();
        assert_eq!(last.percent, phase_interval(Phase::ParallelAnalysis).1);
    }

    #[test]
    fn eta_skipped_below_minimum_percent() {
        assert!(ProgressCoordinator::eta(Duration::from_secs(10), 2).is_none());
    }

    #[test]
    fn eta_capped_at_two_hours() {
        let eta = ProgressCoordinator::eta(Duration::from_secs(10), 3).unwrap();
        assert!(eta <= ETA_CAP);
    }
}
