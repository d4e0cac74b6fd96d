//! Terminal UI for a recovery session, rendered via `indicatif` progress bars.
//!
//! Two bars are stacked vertically:
//! - Phase bar — tracks how many planned phases have finished
//! - Status bar — spinner with the live phase, tested count, and efficiency
//!
//! The UI is driven entirely by [`EventBus`] subscriptions, so the core stays
//! free of terminal concerns.

use crate::events::{Event, EventKind};
use crate::orchestrator::CrackOrchestrator;
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

pub struct RecoveryUi {
    multi: MultiProgress,
    phase_bar: ProgressBar,
    status_bar: ProgressBar,
}

impl RecoveryUi {
    pub fn new(total_phases: u64) -> Arc<Self> {
        let multi = MultiProgress::new();

        let phase_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");
        let phase_bar = multi.add(ProgressBar::new(total_phases));
        phase_bar.set_style(phase_style);
        phase_bar.set_prefix("Phases");

        let status_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .expect("progress bar template is a valid static string");
        let status_bar = multi.add(ProgressBar::new_spinner());
        status_bar.set_style(status_style);
        status_bar.set_prefix("Status");
        status_bar.enable_steady_tick(Duration::from_millis(120));

        Arc::new(Self {
            multi,
            phase_bar,
            status_bar,
        })
    }

    /// Wire this UI into the orchestrator's event buses.
    pub fn attach(self: &Arc<Self>, orchestrator: &mut CrackOrchestrator) {
        let events = orchestrator.monitor_events_mut();

        let ui = Arc::clone(self);
        events.subscribe(EventKind::PhaseStarted, move |event| {
            if let Event::PhaseStarted {
                phase, timeout_ms, ..
            } = event
            {
                ui.status_bar.set_message(format!(
                    "{} (deadline {}s)",
                    style(phase.as_str()).yellow(),
                    timeout_ms / 1000
                ));
            }
        });

        let ui = Arc::clone(self);
        events.subscribe(EventKind::ProgressUpdate, move |event| {
            if let Event::ProgressUpdate {
                phase,
                tested_count,
                efficiency,
                ..
            } = event
            {
                ui.status_bar.set_message(format!(
                    "{} tested {} ({:.1}/s)",
                    style(phase.as_str()).yellow(),
                    tested_count,
                    efficiency
                ));
            }
        });

        let ui = Arc::clone(self);
        events.subscribe(EventKind::PhaseSkipped, move |event| {
            if let Event::PhaseSkipped { phase, reason, .. } = event {
                ui.print_line(format!(
                    "{} {} skipped: {}",
                    style("↷").dim(),
                    phase.as_str(),
                    style(reason.as_str()).red()
                ));
                ui.phase_bar.inc(1);
            }
        });

        let ui = Arc::clone(self);
        events.subscribe(EventKind::PhaseCompleted, move |event| {
            if let Event::PhaseCompleted { phase, success, .. } = event {
                let mark = if *success {
                    style("✓").green()
                } else {
                    style("·").dim()
                };
                ui.print_line(format!("{} {} finished", mark, phase.as_str()));
                ui.phase_bar.inc(1);
            }
        });
    }

    /// Print a line without tearing the bars, falling back to stderr when the
    /// rich UI is unavailable.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Tear down the bars with a final message.
    pub fn finish(&self, msg: &str) {
        self.status_bar.finish_and_clear();
        self.phase_bar.finish_with_message(msg.to_string());
    }
}
