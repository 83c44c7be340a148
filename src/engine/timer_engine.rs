//! Timer engine state machine.
//!
//! The engine owns the activity label, the running interval and the
//! reconciled progress. It has no threads or timers of its own: the host
//! calls [`TimerEngine::reconcile`] whenever it wants fresh values (a
//! periodic tick, a lifecycle event, a relaunch) and the answer is always
//! derived from the anchor, so missed calls never cause drift.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> Stopped -> Running ...
//!           ^  |
//!           +--+  confirm_restart (stays running, progress zeroed)
//! ```

use std::sync::Arc;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::reconcile::Progress;
use super::record::{self, RunRecord, StoredRun};
use crate::services::{Clock, PersistentStore};
use crate::state::{Dialog, TimerSnapshot};

/// Maximum label length in code points
pub const LABEL_MAX_LENGTH: usize = 17;

/// Maximum restart reason length in code points
pub const RESTART_REASON_MAX_LENGTH: usize = 100;

/// What happens when a running interval completes a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CyclePolicy {
    /// Keep counting across cycle boundaries
    #[default]
    Continuous,
    /// Count the first completed cycle, zero the accumulator and stop
    StopAfterCycle,
}

/// Construction-time options
#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    pub policy: CyclePolicy,
    /// Label used when none is persisted
    pub initial_label: Option<String>,
}

pub struct TimerEngine {
    store: Arc<dyn PersistentStore>,
    clock: Arc<dyn Clock>,
    policy: CyclePolicy,
    label: String,
    label_over_limit: bool,
    has_ever_started: bool,
    /// Present exactly while running
    run: Option<RunRecord>,
    progress: Progress,
    dialog: Dialog,
    restart_reason: String,
    reason_over_limit: bool,
}

impl TimerEngine {
    /// Build the engine from whatever the store holds.
    ///
    /// A stored run is treated as having kept going while the process was
    /// not alive and is reconciled immediately. A malformed record is
    /// discarded and the engine starts idle.
    pub fn load(
        store: Arc<dyn PersistentStore>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        let stored_label = record::load_label(store.as_ref());
        let label_source = stored_label.clone().or(settings.initial_label);
        let label = label_source
            .as_deref()
            .map(|l| truncate_chars(l, LABEL_MAX_LENGTH))
            .unwrap_or_default();

        let mut engine = Self {
            store,
            clock,
            policy: settings.policy,
            label,
            label_over_limit: false,
            has_ever_started: false,
            run: None,
            progress: Progress::ZERO,
            dialog: Dialog::None,
            restart_reason: String::new(),
            reason_over_limit: false,
        };

        if stored_label.as_deref() != Some(engine.label.as_str()) && !engine.label.is_empty() {
            record::save_label(engine.store.as_ref(), &engine.label);
        }

        match record::load_run(engine.store.as_ref()) {
            StoredRun::Absent => {
                info!("No persisted run, timer is idle");
            }
            StoredRun::Running(run) => {
                info!(
                    "Resuming run anchored at {} ({} cycles banked)",
                    run.anchor, run.baseline.completed_cycles
                );
                engine.has_ever_started = true;
                engine.progress = run.baseline;
                engine.run = Some(run);
                engine.reconcile();
            }
            StoredRun::Malformed(reason) => {
                warn!("Discarding malformed timer record: {}", reason);
                record::clear_run(engine.store.as_ref());
            }
        }

        engine
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    pub fn has_ever_started(&self) -> bool {
        self.has_ever_started
    }

    pub fn can_start(&self) -> bool {
        !self.label.is_empty()
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn anchor(&self) -> Option<DateTime<Utc>> {
        self.run.map(|r| r.anchor)
    }

    pub fn dialog(&self) -> Dialog {
        self.dialog
    }

    pub fn restart_reason(&self) -> &str {
        &self.restart_reason
    }

    pub fn policy(&self) -> CyclePolicy {
        self.policy
    }

    /// Current values for display. Alert flags are left false; the host fills them in.
    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            label: self.label.clone(),
            label_max_length: LABEL_MAX_LENGTH,
            can_start: self.can_start(),
            is_running: self.is_running(),
            has_ever_started: self.has_ever_started,
            show_restart: self.has_ever_started,
            completed_cycles: self.progress.completed_cycles,
            accumulated_seconds: self.progress.accumulated_seconds,
            progress: self.progress.fraction(),
            time_string: self.progress.time_string(),
            dialog: self.dialog,
            restart_reason: self.restart_reason.clone(),
            restart_reason_max_length: RESTART_REASON_MAX_LENGTH,
            label_alert_visible: false,
            restart_reason_alert_visible: false,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start, or re-anchor a running interval at the current moment.
    ///
    /// The activity label is whatever [`TimerEngine::edit_label`] last
    /// accepted (or the stored/initial label after load). Returns false
    /// and changes nothing when that label is empty.
    pub fn start(&mut self) -> bool {
        if !self.can_start() {
            debug!("Ignoring start with an empty label");
            return false;
        }

        let now = self.clock.now();
        if self.run.is_some() {
            self.reconcile_at(now);
        }

        let run = RunRecord {
            anchor: now,
            baseline: self.progress,
        };
        self.run = Some(run);
        self.has_ever_started = true;
        record::save_run(self.store.as_ref(), &run);

        info!(
            "Timer started for {:?} at {} ({} cycles, {} banked)",
            self.label,
            now,
            run.baseline.completed_cycles,
            run.baseline.time_string()
        );
        true
    }

    /// Stop the running interval and discard its progress.
    ///
    /// Returns false when nothing was running.
    pub fn stop(&mut self) -> bool {
        if self.run.is_none() {
            debug!("Stop requested while not running");
            return false;
        }

        let last = self.reconcile();
        if self.run.is_none() {
            // The final reconcile completed a cycle under StopAfterCycle.
            return true;
        }

        self.run = None;
        self.progress = Progress::ZERO;
        record::clear_run(self.store.as_ref());
        info!(
            "Timer stopped at {} cycles, {} into cycle",
            last.completed_cycles,
            last.time_string()
        );
        true
    }

    /// Recompute progress from the anchor at the clock's current time.
    pub fn reconcile(&mut self) -> Progress {
        let now = self.clock.now();
        self.reconcile_at(now)
    }

    /// Recompute progress from the anchor at `now`.
    pub fn reconcile_at(&mut self, now: DateTime<Utc>) -> Progress {
        let Some(run) = self.run else {
            return self.progress;
        };

        let next = run.progress_at(now);
        if next.completed_cycles < self.progress.completed_cycles {
            debug!("Clock moved behind a completed cycle, keeping {:?}", self.progress);
            return self.progress;
        }

        let crossed = next.completed_cycles - self.progress.completed_cycles;
        if crossed > 0 && self.policy == CyclePolicy::StopAfterCycle {
            self.progress = Progress {
                completed_cycles: self.progress.completed_cycles + 1,
                accumulated_seconds: 0.0,
            };
            self.run = None;
            record::clear_run(self.store.as_ref());
            info!(
                "Cycle completed, timer stopped at {} cycles",
                self.progress.completed_cycles
            );
            return self.progress;
        }

        if crossed > 0 {
            info!(
                "Completed {} cycle(s), now at {}",
                crossed, next.completed_cycles
            );
        }
        self.progress = next;
        self.progress
    }

    /// Open the restart confirmation. Timer state is untouched.
    pub fn request_restart(&mut self) {
        self.dialog = Dialog::Restart;
    }

    /// Zero all progress. A running timer keeps running from a fresh anchor.
    ///
    /// Returns false when no restart was pending.
    pub fn confirm_restart(&mut self) -> bool {
        if self.dialog != Dialog::Restart {
            debug!("Restart confirmed without a pending request");
            return false;
        }

        let reason = std::mem::take(&mut self.restart_reason);
        self.dialog = Dialog::None;
        self.reason_over_limit = false;
        self.progress = Progress::ZERO;

        if self.run.is_some() {
            let run = RunRecord {
                anchor: self.clock.now(),
                baseline: Progress::ZERO,
            };
            self.run = Some(run);
            record::clear_run(self.store.as_ref());
            record::save_run(self.store.as_ref(), &run);
        } else {
            record::clear_run(self.store.as_ref());
        }

        info!(
            "Timer restarted (running={}, reason={:?})",
            self.is_running(),
            reason
        );
        true
    }

    /// Dismiss the restart confirmation and drop the typed reason.
    pub fn cancel_restart(&mut self) {
        if self.dialog == Dialog::Restart {
            self.dialog = Dialog::None;
        }
        self.restart_reason.clear();
        self.reason_over_limit = false;
    }

    pub fn request_close(&mut self) {
        self.dialog = Dialog::Close;
    }

    /// Stop the timer once the close dialog is confirmed.
    pub fn confirm_close(&mut self) -> bool {
        if self.dialog != Dialog::Close {
            debug!("Close confirmed without a pending request");
            return false;
        }
        self.dialog = Dialog::None;
        self.stop();
        true
    }

    pub fn cancel_close(&mut self) {
        if self.dialog == Dialog::Close {
            self.dialog = Dialog::None;
        }
    }

    /// Accept a new label, truncated to [`LABEL_MAX_LENGTH`].
    ///
    /// Returns true only when the input goes from within the limit to over it.
    pub fn edit_label(&mut self, value: &str) -> bool {
        let over = value.chars().count() > LABEL_MAX_LENGTH;
        let crossed = over && !self.label_over_limit;
        self.label_over_limit = over;

        let accepted = truncate_chars(value, LABEL_MAX_LENGTH);
        if accepted != self.label {
            self.label = accepted;
            record::save_label(self.store.as_ref(), &self.label);
        }
        crossed
    }

    /// Update the restart reason. Input is capped one past the limit so the
    /// over-limit state stays visible. Returns true on the edge crossing.
    pub fn edit_restart_reason(&mut self, value: &str) -> bool {
        let capped = truncate_chars(value, RESTART_REASON_MAX_LENGTH + 1);
        let over = capped.chars().count() > RESTART_REASON_MAX_LENGTH;
        let crossed = over && !self.reason_over_limit;
        self.reason_over_limit = over;
        self.restart_reason = capped;
        crossed
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Host came to the foreground. Returns whether ticking should run.
    pub fn on_foreground(&mut self) -> bool {
        let progress = self.reconcile();
        debug!("Foreground reconcile: {:?}", progress);
        self.is_running()
    }

    /// Host is going to the background; persist progress in case it never returns.
    pub fn on_background(&mut self) {
        self.flush();
    }

    /// Reconcile and write the running interval re-based at the current time.
    ///
    /// The stored baseline is the progress already published, so a clock
    /// that stepped backwards cannot persist fewer completed cycles.
    pub fn flush(&mut self) {
        let now = self.clock.now();
        self.reconcile_at(now);
        if self.run.is_some() {
            let rebased = RunRecord {
                anchor: now,
                baseline: self.progress,
            };
            self.run = Some(rebased);
            record::save_run(self.store.as_ref(), &rebased);
            debug!("Flushed running interval at {}", now);
        }
    }
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
