//! Session sequencing and external-tool execution.
//!
//! `CrackOrchestrator` owns one recovery session at a time: it probes the
//! cracking tool, derives the phase plan from the file context, and runs each
//! phase against the tool while feeding throttled progress into the
//! [`PhaseMonitor`]. A skip decision from the monitor turns into a
//! best-effort kill of the child process; natural exit and cancellation race
//! safely because the monitor finalizes a phase exactly once.

use crate::cache::CandidateCache;
use crate::config::CrackConfig;
use crate::context::{FileCharacteristics, SessionContext};
use crate::errors::CrackError;
use crate::events::{Event, EventBus};
use crate::learner::{PatternLearner, MODEL_FILE};
use crate::monitor::{MonitorStats, PhaseMonitor, SkipReason};
use crate::phase::{Phase, PhaseDescriptor};
use crate::tool::{self, PhaseJobConfig};
use anyhow::Context;
use serde::Serialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Watchdog period for re-checking the phase deadline even when the tool is
/// silent.
const DEADLINE_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Minimum interval between progress forwards into the monitor.
const PROGRESS_THROTTLE: Duration = Duration::from_secs(1);

/// Where a recovered password came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Cache,
    Tool,
}

/// Outcome of one phase run. Never an error for skip/exhaustion/unavailable
/// conditions — only a spawn failure surfaces as `Err` from `run_phase`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseRunOutcome {
    pub phase: Phase,
    pub success: bool,
    pub password: Option<String>,
    pub source: Option<ResultSource>,
    pub duration_ms: u64,
    pub tested_count: u64,
    /// `exhausted`, `error`, `tool_unavailable`, or a skip reason.
    pub reason: Option<String>,
    pub exit_code: Option<i32>,
}

impl PhaseRunOutcome {
    fn cache_hit(phase: Phase, password: String) -> Self {
        Self {
            phase,
            success: true,
            password: Some(password),
            source: Some(ResultSource::Cache),
            duration_ms: 0,
            tested_count: 0,
            reason: None,
            exit_code: None,
        }
    }

    fn tool_unavailable(phase: Phase) -> Self {
        Self {
            phase,
            success: false,
            password: None,
            source: None,
            duration_ms: 0,
            tested_count: 0,
            reason: Some("tool_unavailable".into()),
            exit_code: None,
        }
    }
}

/// Result of `start_session`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionPlan {
    pub session_id: Uuid,
    pub phases: Vec<PhaseDescriptor>,
    pub tool_available: bool,
}

/// Aggregate counters across the orchestrator's lifetime.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PerformanceMetrics {
    pub total_tested: u64,
    pub total_time_ms: u64,
    pub phases_skipped: u64,
    pub cache_hits: u64,
    /// Candidates per second across all tool time.
    pub average_efficiency: f64,
}

/// Snapshot for dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStats {
    pub metrics: PerformanceMetrics,
    pub cache_entries: usize,
    pub tool_available: bool,
    pub current_session: Option<Uuid>,
    pub monitor: MonitorStats,
}

struct Session {
    id: Uuid,
    context: SessionContext,
    characteristics: FileCharacteristics,
    started_at: Instant,
    phases: Vec<PhaseDescriptor>,
}

/// Raw results of one tool invocation, before classification.
struct ToolRun {
    found_password: Option<String>,
    tested_count: u64,
    duration_ms: u64,
    exit_code: Option<i32>,
    skipped: Option<SkipReason>,
    stderr: String,
}

/// Coordinates phases, the external tool, the cache, and the learner for one
/// session at a time.
pub struct CrackOrchestrator {
    config: CrackConfig,
    monitor: PhaseMonitor,
    learner: PatternLearner,
    cache: CandidateCache,
    events: EventBus,
    tool_path: Option<PathBuf>,
    initialized: bool,
    session: Option<Session>,
    metrics: PerformanceMetrics,
}

impl CrackOrchestrator {
    pub fn new(config: CrackConfig) -> Self {
        let store_path = config.model_path.clone().unwrap_or_else(|| {
            PatternLearner::default_store_path().unwrap_or_else(|_| PathBuf::from(MODEL_FILE))
        });
        let learner = PatternLearner::open(store_path, config.blend);
        let monitor = PhaseMonitor::new(config.monitor.clone());
        let cache = CandidateCache::new(config.cache.capacity);
        Self {
            config,
            monitor,
            learner,
            cache,
            events: EventBus::new(),
            tool_path: None,
            initialized: false,
            session: None,
            metrics: PerformanceMetrics::default(),
        }
    }

    /// Probe for a usable cracking tool. Not finding one is non-fatal: the
    /// orchestrator stays usable and every phase reports `tool_unavailable`.
    pub async fn initialize(&mut self) -> bool {
        self.tool_path = tool::detect_tool(self.config.tool_override()).await;
        self.initialized = true;
        match &self.tool_path {
            Some(path) => info!(tool = %path.display(), "cracking tool ready"),
            None => warn!("no usable cracking tool found, phases will report tool_unavailable"),
        }
        self.tool_path.is_some()
    }

    pub fn tool_available(&self) -> bool {
        self.tool_path.is_some()
    }

    /// Observer bus for session lifecycle events.
    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Observer bus for phase lifecycle events (started/progress/skip/complete).
    pub fn monitor_events_mut(&mut self) -> &mut EventBus {
        self.monitor.events_mut()
    }

    pub fn learner(&self) -> &PatternLearner {
        &self.learner
    }

    /// Derive file characteristics and build the ordered phase plan for a
    /// new session.
    pub fn start_session(&mut self, context: SessionContext) -> Result<SessionPlan, CrackError> {
        if !self.initialized {
            return Err(CrackError::NotInitialized);
        }

        let characteristics = FileCharacteristics::analyze(&context);
        let phases = Self::build_phase_plan(&context, &characteristics);
        let session = Session {
            id: Uuid::new_v4(),
            context,
            characteristics,
            started_at: Instant::now(),
            phases: phases.clone(),
        };
        let plan = SessionPlan {
            session_id: session.id,
            phases,
            tool_available: self.tool_available(),
        };

        info!(
            session = %session.id,
            phases = plan.phases.len(),
            tool_available = plan.tool_available,
            "recovery session started"
        );
        self.events.emit(&Event::SessionStarted {
            session_id: session.id,
            phases: plan.phases.clone(),
        });
        self.session = Some(session);

        Ok(plan)
    }

    /// Ordered phase plan: short passwords first for small archives, common
    /// and dictionary always, a date phase when the name carries a year-like
    /// digit run, masks and brute force last.
    fn build_phase_plan(
        context: &SessionContext,
        characteristics: &FileCharacteristics,
    ) -> Vec<PhaseDescriptor> {
        let mut phases = Vec::new();
        if characteristics.is_small_file() {
            phases.push(PhaseDescriptor::new(Phase::ShortPasswords));
        }
        phases.push(PhaseDescriptor::new(Phase::CommonPasswords));
        phases.push(PhaseDescriptor::new(Phase::DictionaryAttack));
        if context.has_year_marker() {
            phases.push(PhaseDescriptor::new(Phase::DatePatterns));
        }
        phases.push(PhaseDescriptor::new(Phase::MaskAttack));
        phases.push(PhaseDescriptor::new(Phase::BruteForce));
        phases
    }

    /// Run one phase to an outcome.
    ///
    /// Checks the result cache first; on a miss, starts monitor tracking,
    /// invokes the tool, and classifies the exit as
    /// success > exhausted > error. Only a spawn failure is an `Err` — every
    /// other condition degrades into the returned outcome and the session
    /// can continue with the next phase.
    pub async fn run_phase(
        &mut self,
        phase: Phase,
        mut config: PhaseJobConfig,
    ) -> Result<PhaseRunOutcome, CrackError> {
        let (context, characteristics) = {
            let session = self.session.as_ref().ok_or(CrackError::NoActiveSession)?;
            (session.context.clone(), session.characteristics.clone())
        };

        // Learned masks lead the mask phase when the caller has no override.
        if phase == Phase::MaskAttack && config.mask.is_none() {
            if let Some(best) = self.learner.priority_masks().into_iter().next() {
                debug!(mask = %best.mask, probability = best.probability, "using learned mask");
                config.mask = Some(best.mask);
            }
        }

        let start = self.monitor.start_phase(phase, &characteristics);
        debug!(%phase, timeout_ms = start.timeout_ms, "phase run begins");

        let cache_key = CandidateCache::fingerprint(phase, &config, &context);
        if self.config.cache.enabled {
            if let Some(entry) = self.cache.get(&cache_key) {
                let password = entry.password.clone();
                info!(%phase, "result cache hit");
                self.metrics.cache_hits += 1;
                self.monitor.complete_phase(true, Some(&password));
                return Ok(PhaseRunOutcome::cache_hit(phase, password));
            }
        }

        if self.tool_path.is_none() {
            self.monitor.complete_phase(false, None);
            return Ok(PhaseRunOutcome::tool_unavailable(phase));
        }

        let run = match self
            .execute_tool_phase(phase, &config, context.hash_file.clone())
            .await
        {
            Ok(run) => run,
            Err(err) => {
                self.monitor.complete_phase(false, None);
                return Err(err);
            }
        };

        let outcome = self.classify_run(phase, run);

        // The skip path has already finalized the monitor; this is a no-op
        // then, and the real finalization otherwise.
        self.monitor
            .complete_phase(outcome.success, outcome.password.as_deref());

        self.metrics.total_tested += outcome.tested_count;
        self.metrics.total_time_ms += outcome.duration_ms;
        if self.metrics.total_time_ms > 0 {
            self.metrics.average_efficiency =
                self.metrics.total_tested as f64 / self.metrics.total_time_ms as f64 * 1000.0;
        }

        if outcome.success {
            if let Some(password) = &outcome.password {
                if self.config.cache.enabled {
                    self.cache.insert(cache_key, phase, password.clone());
                }
                self.learner.record_success(password, &context);
            }
        }

        Ok(outcome)
    }

    /// Spawn the tool and stream its stdout until exit, forwarding throttled
    /// progress to the monitor and re-checking the deadline every 5 s. A
    /// skip decision sends a best-effort kill; the loop then drains output
    /// until the process exits on its own terms.
    async fn execute_tool_phase(
        &mut self,
        phase: Phase,
        config: &PhaseJobConfig,
        hash_file: PathBuf,
    ) -> Result<ToolRun, CrackError> {
        let tool_path = self.tool_path.clone().ok_or(CrackError::ToolUnavailable)?;
        let args = tool::build_args(phase, config, &hash_file);
        debug!(tool = %tool_path.display(), ?args, "spawning cracking tool");

        let started = Instant::now();
        let mut child = Command::new(&tool_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(CrackError::SpawnFailed)?;

        let stdout = child
            .stdout
            .take()
            .context("Failed to capture tool stdout")?;
        let mut reader = BufReader::new(stdout).lines();

        // Drain stderr off to the side so a chatty tool cannot deadlock on a
        // full pipe.
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut buf).await;
            }
            buf
        });

        let mut interval = tokio::time::interval(DEADLINE_CHECK_INTERVAL);
        interval.tick().await;

        let mut tested_count: u64 = 0;
        let mut current_candidate = String::new();
        let mut found_password: Option<String> = None;
        let mut last_forward: Option<Instant> = None;
        let mut skipped: Option<SkipReason> = None;
        let mut kill_sent = false;

        loop {
            tokio::select! {
                line = reader.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            if let Some(password) = tool::extract_password(&line) {
                                found_password = Some(password);
                            }
                            let progress = tool::parse_progress_line(&line);
                            if let Some(count) = progress.tested_count {
                                // Retain the last known value on regressions
                                // or parse anomalies.
                                if count > tested_count {
                                    tested_count = count;
                                }
                            }
                            if let Some(candidate) = progress.candidate {
                                current_candidate = candidate;
                            }
                            if let Some(speed) = progress.speed {
                                debug!(%phase, speed, "tool hash rate");
                            }

                            let due = last_forward
                                .map_or(true, |at| at.elapsed() >= PROGRESS_THROTTLE);
                            if due && skipped.is_none() {
                                last_forward = Some(Instant::now());
                                let eval =
                                    self.monitor.update_progress(tested_count, &current_candidate);
                                if let Some(reason) = eval.skip {
                                    skipped = Some(reason);
                                    if !kill_sent {
                                        let _ = child.start_kill();
                                        kill_sent = true;
                                    }
                                }
                            }
                        }
                        Ok(None) => break,
                        Err(err) => {
                            warn!(%err, "tool stdout read failed");
                            break;
                        }
                    }
                }
                _ = interval.tick() => {
                    if skipped.is_none() {
                        if let Some(reason) = self.monitor.check_deadline() {
                            skipped = Some(reason);
                            if !kill_sent {
                                let _ = child.start_kill();
                                kill_sent = true;
                            }
                        }
                    }
                }
            }
        }

        let status = child
            .wait()
            .await
            .context("Failed to wait for tool exit")?;
        let stderr = stderr_task.await.unwrap_or_default();
        let duration_ms = started.elapsed().as_millis() as u64;

        Ok(ToolRun {
            found_password,
            tested_count,
            duration_ms,
            exit_code: status.code(),
            skipped,
            stderr,
        })
    }

    /// Classify a finished tool run: a recognized password wins, then a skip,
    /// then clean exhaustion (exit 0), then error.
    fn classify_run(&mut self, phase: Phase, run: ToolRun) -> PhaseRunOutcome {
        if run.skipped.is_some() {
            self.metrics.phases_skipped += 1;
        }

        if let Some(password) = run.found_password {
            info!(%phase, duration_ms = run.duration_ms, "password recovered");
            return PhaseRunOutcome {
                phase,
                success: true,
                password: Some(password),
                source: Some(ResultSource::Tool),
                duration_ms: run.duration_ms,
                tested_count: run.tested_count,
                reason: None,
                exit_code: run.exit_code,
            };
        }

        let reason = if let Some(skip) = run.skipped {
            skip.as_str().to_string()
        } else if run.exit_code == Some(0) {
            "exhausted".to_string()
        } else {
            if !run.stderr.trim().is_empty() {
                warn!(%phase, stderr = %run.stderr.trim(), "tool reported errors");
            }
            "error".to_string()
        };

        PhaseRunOutcome {
            phase,
            success: false,
            password: None,
            source: None,
            duration_ms: run.duration_ms,
            tested_count: run.tested_count,
            reason: Some(reason),
            exit_code: run.exit_code,
        }
    }

    /// End the current session and emit `SessionStopped`. Safe to call with
    /// no session active.
    pub fn stop_session(&mut self) -> Option<Uuid> {
        let session = self.session.take()?;
        let duration_ms = session.started_at.elapsed().as_millis() as u64;
        info!(session = %session.id, duration_ms, "recovery session stopped");
        self.events.emit(&Event::SessionStopped {
            session_id: session.id,
            duration_ms,
        });
        Some(session.id)
    }

    /// The plan of the active session, if any.
    pub fn session_phases(&self) -> Option<&[PhaseDescriptor]> {
        self.session.as_ref().map(|s| s.phases.as_slice())
    }

    /// Aggregate statistics for dashboards.
    pub fn statistics(&self) -> OrchestratorStats {
        OrchestratorStats {
            metrics: self.metrics,
            cache_entries: self.cache.len(),
            tool_available: self.tool_available(),
            current_session: self.session.as_ref().map(|s| s.id),
            monitor: self.monitor.statistics(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use std::path::Path;
    use tempfile::{TempDir, tempdir};

    #[cfg(unix)]
    fn write_tool(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-tool");
        std::fs::write(&path, body).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn test_config(dir: &TempDir, tool: Option<PathBuf>) -> CrackConfig {
        CrackConfig {
            tool_path: tool,
            model_path: Some(dir.path().join("patterns.json")),
            cache: CacheConfig {
                enabled: true,
                capacity: 100,
            },
            ..CrackConfig::default()
        }
    }

    fn small_dated_context(dir: &TempDir) -> SessionContext {
        SessionContext::new(dir.path().join("hashes.txt"), "IMG_2023_vacation.zip", 500 * 1024)
    }

    #[tokio::test]
    async fn start_session_requires_initialize() {
        let dir = tempdir().unwrap();
        let mut orch = CrackOrchestrator::new(test_config(&dir, None));
        let err = orch.start_session(small_dated_context(&dir)).unwrap_err();
        assert!(matches!(err, CrackError::NotInitialized));
    }

    #[tokio::test]
    async fn run_phase_requires_session() {
        let dir = tempdir().unwrap();
        let mut orch = CrackOrchestrator::new(test_config(&dir, None));
        orch.initialize().await;
        let err = orch
            .run_phase(Phase::CommonPasswords, PhaseJobConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CrackError::NoActiveSession));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn plan_orders_phases_by_file_characteristics() {
        let dir = tempdir().unwrap();
        let tool = write_tool(dir.path(), "#!/bin/sh\nexit 0\n");
        let mut orch = CrackOrchestrator::new(test_config(&dir, Some(tool)));
        assert!(orch.initialize().await);

        let plan = orch.start_session(small_dated_context(&dir)).unwrap();
        assert!(plan.tool_available);
        let phases: Vec<Phase> = plan.phases.iter().map(|d| d.phase).collect();
        assert_eq!(
            phases,
            vec![
                Phase::ShortPasswords,
                Phase::CommonPasswords,
                Phase::DictionaryAttack,
                Phase::DatePatterns,
                Phase::MaskAttack,
                Phase::BruteForce,
            ]
        );

        // A large archive without digits gets neither the short nor the
        // date phase.
        let context =
            SessionContext::new(dir.path().join("h.txt"), "plain-archive.rar", 50 * 1024 * 1024);
        let plan = orch.start_session(context).unwrap();
        let phases: Vec<Phase> = plan.phases.iter().map(|d| d.phase).collect();
        assert_eq!(
            phases,
            vec![
                Phase::CommonPasswords,
                Phase::DictionaryAttack,
                Phase::MaskAttack,
                Phase::BruteForce,
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_run_returns_password_and_feeds_cache_and_learner() {
        let dir = tempdir().unwrap();
        let tool = write_tool(
            dir.path(),
            "#!/bin/sh\necho 'Progress.........: 1200'\necho 'deadbeef:hunter2'\nexit 0\n",
        );
        let mut orch = CrackOrchestrator::new(test_config(&dir, Some(tool)));
        orch.initialize().await;
        orch.start_session(small_dated_context(&dir)).unwrap();

        let outcome = orch
            .run_phase(Phase::CommonPasswords, PhaseJobConfig::default())
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.password.as_deref(), Some("hunter2"));
        assert_eq!(outcome.source, Some(ResultSource::Tool));
        assert_eq!(outcome.tested_count, 1200);
        assert_eq!(outcome.exit_code, Some(0));

        assert_eq!(orch.learner().total_success(), 1);
        let stats = orch.statistics();
        assert_eq!(stats.cache_entries, 1);
        assert_eq!(stats.metrics.total_tested, 1200);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn identical_rerun_is_served_from_cache_without_tool_invocation() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("invocations.txt");
        let tool = write_tool(
            dir.path(),
            &format!(
                "#!/bin/sh\necho run >> {}\necho 'deadbeef:hunter2'\nexit 0\n",
                marker.display()
            ),
        );
        let mut orch = CrackOrchestrator::new(test_config(&dir, Some(tool)));
        orch.initialize().await;
        orch.start_session(small_dated_context(&dir)).unwrap();

        let first = orch
            .run_phase(Phase::CommonPasswords, PhaseJobConfig::default())
            .await
            .unwrap();
        assert_eq!(first.source, Some(ResultSource::Tool));

        let second = orch
            .run_phase(Phase::CommonPasswords, PhaseJobConfig::default())
            .await
            .unwrap();
        assert!(second.success);
        assert_eq!(second.source, Some(ResultSource::Cache));
        assert_eq!(second.password.as_deref(), Some("hunter2"));
        assert_eq!(second.duration_ms, 0);

        let invocations = std::fs::read_to_string(&marker).unwrap();
        assert_eq!(invocations.lines().count(), 1);
        assert_eq!(orch.statistics().metrics.cache_hits, 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn clean_exit_without_password_is_exhausted() {
        let dir = tempdir().unwrap();
        let tool = write_tool(
            dir.path(),
            "#!/bin/sh\necho 'Progress.........: 50'\nexit 0\n",
        );
        let mut orch = CrackOrchestrator::new(test_config(&dir, Some(tool)));
        orch.initialize().await;
        orch.start_session(small_dated_context(&dir)).unwrap();

        let outcome = orch
            .run_phase(Phase::CommonPasswords, PhaseJobConfig::default())
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.reason.as_deref(), Some("exhausted"));
        assert_eq!(outcome.tested_count, 50);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_an_error_outcome_not_an_err() {
        let dir = tempdir().unwrap();
        let tool = write_tool(dir.path(), "#!/bin/sh\necho 'boom' >&2\nexit 3\n");
        let mut orch = CrackOrchestrator::new(test_config(&dir, Some(tool)));
        orch.initialize().await;
        orch.start_session(small_dated_context(&dir)).unwrap();

        let outcome = orch
            .run_phase(Phase::CommonPasswords, PhaseJobConfig::default())
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.reason.as_deref(), Some("error"));
        assert_eq!(outcome.exit_code, Some(3));
    }

    #[tokio::test]
    async fn missing_tool_degrades_to_tool_unavailable() {
        let dir = tempdir().unwrap();
        let mut orch = CrackOrchestrator::new(test_config(
            &dir,
            Some(PathBuf::from("/nonexistent/hashcat")),
        ));
        assert!(!orch.initialize().await);
        orch.start_session(small_dated_context(&dir)).unwrap();

        let outcome = orch
            .run_phase(Phase::CommonPasswords, PhaseJobConfig::default())
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.reason.as_deref(), Some("tool_unavailable"));
        // The session keeps going: the next phase gets the same degraded
        // outcome instead of an abort.
        let next = orch
            .run_phase(Phase::DictionaryAttack, PhaseJobConfig::default())
            .await
            .unwrap();
        assert_eq!(next.reason.as_deref(), Some("tool_unavailable"));
    }

    #[tokio::test]
    async fn spawn_failure_surfaces_to_caller() {
        let dir = tempdir().unwrap();
        let mut orch = CrackOrchestrator::new(test_config(&dir, None));
        orch.initialize().await;
        orch.start_session(small_dated_context(&dir)).unwrap();
        // Force a path that passes the availability gate but cannot spawn.
        orch.tool_path = Some(PathBuf::from("/nonexistent/hashcat"));

        let err = orch
            .run_phase(Phase::CommonPasswords, PhaseJobConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CrackError::SpawnFailed(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn learned_mask_leads_the_mask_phase() {
        let dir = tempdir().unwrap();
        let args_file = dir.path().join("args.txt");
        let tool = write_tool(
            dir.path(),
            &format!("#!/bin/sh\necho \"$@\" > {}\nexit 0\n", args_file.display()),
        );
        let mut orch = CrackOrchestrator::new(test_config(&dir, Some(tool)));
        orch.initialize().await;
        orch.start_session(small_dated_context(&dir)).unwrap();

        // Teach the learner a dominant six-digit shape.
        for _ in 0..3 {
            orch.learner
                .record_success("123456", &small_dated_context(&dir));
        }

        orch.run_phase(Phase::MaskAttack, PhaseJobConfig::default())
            .await
            .unwrap();
        let args = std::fs::read_to_string(&args_file).unwrap();
        assert!(args.contains("?d?d?d?d?d?d"), "args were: {args}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stop_session_emits_event_and_clears_state() {
        use crate::events::EventKind;
        use std::sync::{Arc, Mutex};

        let dir = tempdir().unwrap();
        let tool = write_tool(dir.path(), "#!/bin/sh\nexit 0\n");
        let mut orch = CrackOrchestrator::new(test_config(&dir, Some(tool)));
        orch.initialize().await;

        let stopped = Arc::new(Mutex::new(0u32));
        let counter = Arc::clone(&stopped);
        orch.events_mut()
            .subscribe(EventKind::SessionStopped, move |_| {
                *counter.lock().unwrap() += 1;
            });

        orch.start_session(small_dated_context(&dir)).unwrap();
        assert!(orch.session_phases().is_some());
        assert!(orch.stop_session().is_some());
        assert!(orch.session_phases().is_none());
        assert_eq!(*stopped.lock().unwrap(), 1);
        // Stopping again is a quiet no-op.
        assert!(orch.stop_session().is_none());
    }
}
