//! Phase efficiency monitoring and skip decisions.
//!
//! `PhaseMonitor` tracks one active phase at a time: it computes the
//! adaptive timeout when a phase starts, ingests throttled progress updates,
//! and decides whether the phase should keep running. Skip policy, in order:
//!
//! 1. hard timeout
//! 2. critical efficiency (after a 10 s / 100-candidate warm-up), then
//!    historical same-phase skip pattern
//! 3. declining trend over the performance window
//! 4. file-characteristic rules (small file, date-named file in the wrong
//!    phase)
//!
//! A phase is finalized exactly once — the first transition out of `Running`
//! wins and every later attempt is a no-op. That guard is what makes the
//! cancellation path race-safe against natural process exit.

use crate::config::MonitorConfig;
use crate::context::FileCharacteristics;
use crate::events::{Event, EventBus};
use crate::phase::Phase;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::time::Instant;
use tracing::{debug, info};

/// Lower clamp for adaptive timeouts (10 s).
pub const MIN_TIMEOUT_MS: u64 = 10_000;
/// Upper clamp for adaptive timeouts (30 min).
pub const MAX_TIMEOUT_MS: u64 = 1_800_000;

/// Elapsed time before efficiency checks start.
const EFFICIENCY_WARMUP_MS: u64 = 10_000;
/// Candidates tested before efficiency checks start.
const EFFICIENCY_WARMUP_TESTED: u64 = 100;
/// Trend slope below which a low-efficiency phase is abandoned.
const DECLINE_SLOPE: f64 = -0.1;
/// Window samples needed before trend analysis runs.
const TREND_MIN_SAMPLES: usize = 5;
/// Same-phase history entries needed before the historical rule applies.
const HISTORY_MIN_ENTRIES: usize = 3;
/// Historical skip rate at which the phase is preemptively abandoned.
const HISTORY_SKIP_RATE: f64 = 0.8;

/// Why a phase was abandoned.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Timeout,
    CriticalLowEfficiency,
    HistoricalPattern,
    DecliningEfficiency,
    SmallFileExtensiveTesting,
    DateFileWrongPhase,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Timeout => "timeout",
            SkipReason::CriticalLowEfficiency => "critical_low_efficiency",
            SkipReason::HistoricalPattern => "historical_pattern",
            SkipReason::DecliningEfficiency => "declining_efficiency",
            SkipReason::SmallFileExtensiveTesting => "small_file_extensive_testing",
            SkipReason::DateFileWrongPhase => "date_file_wrong_phase",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal state machine for one tracked phase.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PhaseState {
    Running,
    Completed { success: bool },
    Skipped { reason: SkipReason },
}

impl PhaseState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PhaseState::Running)
    }
}

/// Serializable summary of one tracked phase.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PhaseReport {
    pub phase: Phase,
    pub timeout_ms: u64,
    pub tested_count: u64,
    pub efficiency: f64,
    pub state: PhaseState,
    pub duration_ms: Option<u64>,
}

/// Record of an abandoned phase, bounded FIFO.
#[derive(Debug, Clone, Serialize)]
pub struct SkipHistoryRecord {
    pub phase: Phase,
    pub reason: SkipReason,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub tested_count: u64,
    pub efficiency: f64,
    pub characteristics: FileCharacteristics,
}

/// In-memory per-phase run statistics for the session.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PhaseLearning {
    pub total_runs: u64,
    pub success_count: u64,
    pub skip_count: u64,
    pub average_success_time_ms: f64,
    pub average_skip_time_ms: f64,
    total_success_time_ms: f64,
    total_skip_time_ms: f64,
}

/// Result of `start_phase`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseStart {
    pub timeout_ms: u64,
    pub should_continue: bool,
}

/// Result of one progress update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEval {
    /// False when no phase was being tracked (the update was a no-op).
    pub active: bool,
    pub elapsed_ms: u64,
    pub efficiency: f64,
    pub skip: Option<SkipReason>,
}

impl ProgressEval {
    fn inactive() -> Self {
        Self {
            active: false,
            elapsed_ms: 0,
            efficiency: 0.0,
            skip: None,
        }
    }
}

/// Live stats of the currently running phase.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentPhaseStats {
    pub elapsed_ms: u64,
    pub timeout_ms: u64,
    pub tested_count: u64,
    pub efficiency: f64,
}

/// Snapshot of everything the monitor has tracked so far.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStats {
    pub current_phase: Option<Phase>,
    pub tracked_phases: usize,
    pub skip_history_len: usize,
    pub learning: HashMap<String, PhaseLearning>,
    pub adaptive_timeouts: HashMap<String, u64>,
    pub current: Option<CurrentPhaseStats>,
}

#[derive(Debug)]
struct ActivePhase {
    phase: Phase,
    started_at: Instant,
    timeout_ms: u64,
    tested_count: u64,
    efficiency: f64,
    state: PhaseState,
    duration_ms: Option<u64>,
}

impl ActivePhase {
    fn report(&self) -> PhaseReport {
        PhaseReport {
            phase: self.phase,
            timeout_ms: self.timeout_ms,
            tested_count: self.tested_count,
            efficiency: self.efficiency,
            state: self.state,
            duration_ms: self.duration_ms,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowSample {
    elapsed_ms: u64,
    tested_count: u64,
    efficiency: f64,
}

enum Outcome {
    Success,
    Completed,
    Skipped,
}

/// Tracks one active phase and decides continue/skip/timeout.
pub struct PhaseMonitor {
    config: MonitorConfig,
    events: EventBus,
    characteristics: FileCharacteristics,
    active: Option<ActivePhase>,
    window: VecDeque<WindowSample>,
    skip_history: VecDeque<SkipHistoryRecord>,
    learning: HashMap<Phase, PhaseLearning>,
    adaptive_timeouts: HashMap<Phase, u64>,
    tracked: HashMap<Phase, PhaseReport>,
}

impl PhaseMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            events: EventBus::new(),
            characteristics: FileCharacteristics::default(),
            active: None,
            window: VecDeque::new(),
            skip_history: VecDeque::new(),
            learning: HashMap::new(),
            adaptive_timeouts: HashMap::new(),
            tracked: HashMap::new(),
        }
    }

    /// Observer bus for phase lifecycle events.
    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Begin tracking a phase: compute its adaptive timeout, reset the
    /// performance window, and emit `PhaseStarted`.
    pub fn start_phase(
        &mut self,
        phase: Phase,
        characteristics: &FileCharacteristics,
    ) -> PhaseStart {
        self.characteristics = characteristics.clone();
        let timeout_ms = self.adaptive_timeout(phase, characteristics);
        self.adaptive_timeouts.insert(phase, timeout_ms);
        self.window.clear();

        let active = ActivePhase {
            phase,
            started_at: Instant::now(),
            timeout_ms,
            tested_count: 0,
            efficiency: 0.0,
            state: PhaseState::Running,
            duration_ms: None,
        };
        self.tracked.insert(phase, active.report());
        self.active = Some(active);

        info!(%phase, timeout_ms, "phase started");
        self.events.emit(&Event::PhaseStarted {
            phase,
            timeout_ms,
            characteristics: characteristics.clone(),
        });

        PhaseStart {
            timeout_ms,
            should_continue: true,
        }
    }

    /// Adaptive timeout: static base scaled by file heuristics, the file's
    /// complexity score, and (when learning is enabled) the phase's learned
    /// average time-to-success. Always clamped to
    /// [`MIN_TIMEOUT_MS`, `MAX_TIMEOUT_MS`].
    pub fn adaptive_timeout(&self, phase: Phase, characteristics: &FileCharacteristics) -> u64 {
        let mut timeout = phase.base_timeout_ms() as f64;

        if characteristics.is_small_file() {
            timeout *= 0.5;
        }
        if characteristics.has_personal_info {
            timeout *= 0.7;
        }
        if characteristics.has_date_pattern {
            timeout *= 0.8;
        }
        timeout *= characteristics.complexity;

        if self.config.learning_enabled {
            if let Some(learning) = self.learning.get(&phase) {
                if learning.average_success_time_ms > 0.0 {
                    let factor = (learning.average_success_time_ms / timeout).min(2.0);
                    timeout *= (1.0 + factor) / 2.0;
                }
            }
        }

        (timeout.round() as u64).clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS)
    }

    /// Ingest one progress update. No-op with a neutral result when no phase
    /// is active. May finalize the phase as skipped; the decision is carried
    /// back to the caller so it can cancel the external process.
    pub fn update_progress(&mut self, tested_count: u64, current_candidate: &str) -> ProgressEval {
        let (phase, elapsed_ms, efficiency) = {
            let Some(active) = self.active.as_mut() else {
                return ProgressEval::inactive();
            };
            let elapsed_ms = active.started_at.elapsed().as_millis() as u64;
            let efficiency = if tested_count > 0 {
                tested_count as f64 / elapsed_ms.max(1) as f64 * 1000.0
            } else {
                0.0
            };
            active.tested_count = tested_count;
            active.efficiency = efficiency;
            (active.phase, elapsed_ms, efficiency)
        };

        self.window.push_back(WindowSample {
            elapsed_ms,
            tested_count,
            efficiency,
        });
        while self.window.len() > self.config.window_size {
            self.window.pop_front();
        }

        let skip = self.should_skip(elapsed_ms, efficiency, tested_count);
        debug!(
            %phase,
            elapsed_ms,
            tested_count,
            efficiency,
            candidate = current_candidate,
            "progress update"
        );

        if let Some(reason) = skip {
            self.skip_phase(reason);
        }

        self.events.emit(&Event::ProgressUpdate {
            phase,
            elapsed_ms,
            tested_count,
            efficiency,
            skip,
        });

        ProgressEval {
            active: true,
            elapsed_ms,
            efficiency,
            skip,
        }
    }

    /// Evaluate the skip policy for the active phase at the given readings.
    /// Returns the first matching reason, or `None` to continue.
    pub fn should_skip(
        &self,
        elapsed_ms: u64,
        efficiency: f64,
        tested_count: u64,
    ) -> Option<SkipReason> {
        let active = self.active.as_ref()?;

        // 1. Hard timeout always wins.
        if elapsed_ms >= active.timeout_ms {
            return Some(SkipReason::Timeout);
        }

        // 2. Efficiency checks only after warm-up.
        if elapsed_ms > EFFICIENCY_WARMUP_MS && tested_count > EFFICIENCY_WARMUP_TESTED {
            if efficiency < self.config.thresholds.critical {
                return Some(SkipReason::CriticalLowEfficiency);
            }
            if self.config.learning_enabled {
                if let Some(reason) = self.historical_skip(active.phase) {
                    return Some(reason);
                }
            }
        }

        // 3. Declining trend over the window.
        if self.window.len() >= TREND_MIN_SAMPLES {
            let recent = self.recent_efficiency();
            let trend = self.efficiency_trend();
            if recent < self.config.thresholds.low && trend < DECLINE_SLOPE {
                return Some(SkipReason::DecliningEfficiency);
            }
        }

        // 4. File-characteristic rules.
        self.characteristic_skip(elapsed_ms, tested_count, active.phase)
    }

    /// Hard-timeout re-check for the periodic watchdog: the tool producing
    /// no output must not stall a phase past its deadline.
    pub fn check_deadline(&mut self) -> Option<SkipReason> {
        let active = self.active.as_ref()?;
        let elapsed_ms = active.started_at.elapsed().as_millis() as u64;
        if elapsed_ms >= active.timeout_ms {
            self.skip_phase(SkipReason::Timeout);
            Some(SkipReason::Timeout)
        } else {
            None
        }
    }

    /// Mean efficiency over the last 3 window samples.
    fn recent_efficiency(&self) -> f64 {
        if self.window.len() < 2 {
            return 0.0;
        }
        let recent: Vec<f64> = self
            .window
            .iter()
            .rev()
            .take(3)
            .map(|s| s.efficiency)
            .collect();
        recent.iter().sum::<f64>() / recent.len() as f64
    }

    /// OLS slope of efficiency over sample index for the last 5 samples.
    fn efficiency_trend(&self) -> f64 {
        if self.window.len() < 3 {
            return 0.0;
        }
        let recent: Vec<f64> = self
            .window
            .iter()
            .rev()
            .take(TREND_MIN_SAMPLES)
            .map(|s| s.efficiency)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        Self::slope(&recent)
    }

    /// Least-squares slope of `values` against their indices. An undefined
    /// slope (degenerate or NaN) is treated as flat.
    fn slope(values: &[f64]) -> f64 {
        let n = values.len() as f64;
        if values.len() < 2 {
            return 0.0;
        }
        let sum_x: f64 = (0..values.len()).map(|i| i as f64).sum();
        let sum_y: f64 = values.iter().sum();
        let sum_xy: f64 = values.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
        let sum_x2: f64 = (0..values.len()).map(|i| (i as f64) * (i as f64)).sum();

        let denominator = n * sum_x2 - sum_x * sum_x;
        if denominator == 0.0 {
            return 0.0;
        }
        let slope = (n * sum_xy - sum_x * sum_y) / denominator;
        if slope.is_nan() { 0.0 } else { slope }
    }

    /// Same-phase historical pattern: once at least 3 skip records exist for
    /// this phase and the skip rate of the most recent 3 is 80%+, give up
    /// early. Below 3 entries the rule deliberately stays silent.
    fn historical_skip(&self, phase: Phase) -> Option<SkipReason> {
        let same_phase: Vec<&SkipHistoryRecord> = self
            .skip_history
            .iter()
            .filter(|record| record.phase == phase)
            .collect();
        if same_phase.len() < HISTORY_MIN_ENTRIES {
            return None;
        }
        // Every history record is a skip, so the recent rate is the filled
        // fraction of the 3-entry window.
        let recent = &same_phase[same_phase.len() - HISTORY_MIN_ENTRIES..];
        let skip_rate = recent.len() as f64 / HISTORY_MIN_ENTRIES as f64;
        if skip_rate >= HISTORY_SKIP_RATE {
            Some(SkipReason::HistoricalPattern)
        } else {
            None
        }
    }

    fn characteristic_skip(
        &self,
        elapsed_ms: u64,
        tested_count: u64,
        phase: Phase,
    ) -> Option<SkipReason> {
        let ch = &self.characteristics;
        if ch.is_small_file() && tested_count > 10_000 && elapsed_ms > 60_000 {
            return Some(SkipReason::SmallFileExtensiveTesting);
        }
        if ch.has_date_pattern && !phase.is_date_related() && elapsed_ms > 120_000 {
            return Some(SkipReason::DateFileWrongPhase);
        }
        None
    }

    /// Finalize the active phase as skipped. Idempotent: once a phase is
    /// terminal, later calls do nothing.
    pub fn skip_phase(&mut self, reason: SkipReason) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        if active.state.is_terminal() {
            self.active = Some(active);
            return;
        }

        let duration_ms = active.started_at.elapsed().as_millis() as u64;
        active.state = PhaseState::Skipped { reason };
        active.duration_ms = Some(duration_ms);
        let report = active.report();

        self.push_history(SkipHistoryRecord {
            phase: active.phase,
            reason,
            timestamp: Utc::now(),
            duration_ms,
            tested_count: active.tested_count,
            efficiency: active.efficiency,
            characteristics: self.characteristics.clone(),
        });
        if self.config.learning_enabled {
            self.update_learning(active.phase, Outcome::Skipped, duration_ms);
        }
        self.tracked.insert(active.phase, report.clone());

        info!(phase = %active.phase, %reason, duration_ms, "phase skipped");
        self.events.emit(&Event::PhaseSkipped {
            phase: active.phase,
            reason,
            report,
        });
    }

    /// Finalize the active phase as completed. Idempotent like `skip_phase`;
    /// calling it after a skip already finalized the phase is a no-op.
    pub fn complete_phase(&mut self, success: bool, candidate: Option<&str>) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        if active.state.is_terminal() {
            self.active = Some(active);
            return;
        }

        let duration_ms = active.started_at.elapsed().as_millis() as u64;
        active.state = PhaseState::Completed { success };
        active.duration_ms = Some(duration_ms);
        let report = active.report();

        if self.config.learning_enabled {
            let outcome = if success {
                Outcome::Success
            } else {
                Outcome::Completed
            };
            self.update_learning(active.phase, outcome, duration_ms);
        }
        self.tracked.insert(active.phase, report.clone());

        info!(phase = %active.phase, success, duration_ms, "phase completed");
        self.events.emit(&Event::PhaseCompleted {
            phase: active.phase,
            success,
            password: candidate.map(str::to_string),
            report,
        });
    }

    fn push_history(&mut self, record: SkipHistoryRecord) {
        self.skip_history.push_back(record);
        while self.skip_history.len() > self.config.max_history_size {
            self.skip_history.pop_front();
        }
    }

    fn update_learning(&mut self, phase: Phase, outcome: Outcome, duration_ms: u64) {
        let entry = self.learning.entry(phase).or_default();
        entry.total_runs += 1;
        match outcome {
            Outcome::Success => {
                entry.success_count += 1;
                entry.total_success_time_ms += duration_ms as f64;
                entry.average_success_time_ms =
                    entry.total_success_time_ms / entry.success_count as f64;
            }
            Outcome::Skipped => {
                entry.skip_count += 1;
                entry.total_skip_time_ms += duration_ms as f64;
                entry.average_skip_time_ms = entry.total_skip_time_ms / entry.skip_count as f64;
            }
            Outcome::Completed => {}
        }
    }

    pub fn current_phase(&self) -> Option<Phase> {
        self.active.as_ref().map(|a| a.phase)
    }

    /// Latest report for a phase, terminal or not.
    pub fn report_for(&self, phase: Phase) -> Option<&PhaseReport> {
        self.tracked.get(&phase)
    }

    pub fn learning_for(&self, phase: Phase) -> Option<&PhaseLearning> {
        self.learning.get(&phase)
    }

    /// Snapshot for dashboards and the aggregate statistics accessor.
    pub fn statistics(&self) -> MonitorStats {
        let current = self.active.as_ref().map(|active| CurrentPhaseStats {
            elapsed_ms: active.started_at.elapsed().as_millis() as u64,
            timeout_ms: active.timeout_ms,
            tested_count: active.tested_count,
            efficiency: active.efficiency,
        });
        MonitorStats {
            current_phase: self.current_phase(),
            tracked_phases: self.tracked.len(),
            skip_history_len: self.skip_history.len(),
            learning: self
                .learning
                .iter()
                .map(|(phase, learning)| (phase.as_str().to_string(), *learning))
                .collect(),
            adaptive_timeouts: self
                .adaptive_timeouts
                .iter()
                .map(|(phase, timeout)| (phase.as_str().to_string(), *timeout))
                .collect(),
            current,
        }
    }

    /// Drop all learned per-phase statistics and skip history.
    pub fn reset_learning(&mut self) {
        self.learning.clear();
        self.skip_history.clear();
    }
}
