//! Persisted key/value record of the running interval
//!
//! The presence of [`keys::ANCHOR_INSTANT`] is the running-state sentinel:
//! the run keys exist exactly while the timer is running. The label is
//! stored independently of run state.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::reconcile::{reconcile, Progress};
use crate::services::PersistentStore;

pub mod keys {
    pub const ANCHOR_INSTANT: &str = "anchor_instant";
    pub const BASELINE_COMPLETED_CYCLES: &str = "baseline_completed_cycles";
    pub const BASELINE_ACCUMULATED_SECONDS: &str = "baseline_accumulated_seconds";
    pub const IS_RUNNING: &str = "is_running";
    pub const ACTIVITY_LABEL: &str = "activity_label";

    /// Keys cleared together when the run ends
    pub const RUN_KEYS: [&str; 4] = [
        ANCHOR_INSTANT,
        BASELINE_COMPLETED_CYCLES,
        BASELINE_ACCUMULATED_SECONDS,
        IS_RUNNING,
    ];
}

/// A running interval: progress banked before `anchor`, counting since `anchor`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunRecord {
    pub anchor: DateTime<Utc>,
    pub baseline: Progress,
}

impl RunRecord {
    pub fn progress_at(&self, now: DateTime<Utc>) -> Progress {
        reconcile(self.baseline, self.anchor, now)
    }

    /// Fold everything up to `now` into the baseline and re-anchor at `now`.
    pub fn rebased(&self, now: DateTime<Utc>) -> RunRecord {
        RunRecord {
            anchor: now,
            baseline: self.progress_at(now),
        }
    }
}

/// Outcome of reading the run keys
#[derive(Debug, Clone, PartialEq)]
pub enum StoredRun {
    /// No anchor stored
    Absent,
    Running(RunRecord),
    /// An anchor exists but cannot be interpreted
    Malformed(String),
}

/// Read the run keys. Missing baseline fields default to zero.
pub fn load_run(store: &dyn PersistentStore) -> StoredRun {
    let anchor = match store.get(keys::ANCHOR_INSTANT) {
        None | Some(Value::Null) => return StoredRun::Absent,
        Some(Value::String(raw)) => match DateTime::parse_from_rfc3339(&raw) {
            Ok(parsed) => parsed.with_timezone(&Utc),
            Err(e) => return StoredRun::Malformed(format!("unparsable anchor {:?}: {}", raw, e)),
        },
        Some(other) => return StoredRun::Malformed(format!("anchor is not a timestamp: {}", other)),
    };

    let cycles = store
        .get(keys::BASELINE_COMPLETED_CYCLES)
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    let seconds = store
        .get(keys::BASELINE_ACCUMULATED_SECONDS)
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);

    StoredRun::Running(RunRecord {
        anchor,
        baseline: Progress::normalized(cycles, seconds),
    })
}

/// Write the full run record in one batch. Failures are logged, not returned.
pub fn save_run(store: &dyn PersistentStore, record: &RunRecord) {
    let result = store.set_many(vec![
        (keys::ANCHOR_INSTANT, json!(record.anchor.to_rfc3339())),
        (keys::BASELINE_COMPLETED_CYCLES, json!(record.baseline.completed_cycles)),
        (keys::BASELINE_ACCUMULATED_SECONDS, json!(record.baseline.accumulated_seconds)),
        (keys::IS_RUNNING, json!(true)),
    ]);
    match result {
        Ok(()) => debug!("Persisted run anchored at {}", record.anchor),
        Err(e) => warn!("Failed to persist timer record: {}", e),
    }
}

/// Remove every run key, leaving the label in place.
pub fn clear_run(store: &dyn PersistentStore) {
    match store.remove_many(&keys::RUN_KEYS) {
        Ok(()) => debug!("Cleared persisted run"),
        Err(e) => warn!("Failed to clear timer record: {}", e),
    }
}

pub fn load_label(store: &dyn PersistentStore) -> Option<String> {
    store
        .get(keys::ACTIVITY_LABEL)
        .and_then(|v| v.as_str().map(str::to_string))
}

pub fn save_label(store: &dyn PersistentStore, label: &str) {
    if let Err(e) = store.set(keys::ACTIVITY_LABEL, json!(label)) {
        warn!("Failed to persist activity label: {}", e);
    }
}

/// Synchronous best-effort flush for process teardown.
///
/// Works directly on the store, without the engine or its channels, and
/// re-bases the stored run at `now` through the same [`reconcile`] as the
/// live path. Returns the progress written, if a run was stored.
pub fn flush_at_exit(store: &dyn PersistentStore, now: DateTime<Utc>) -> Option<Progress> {
    let running = store
        .get(keys::IS_RUNNING)
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if !running {
        debug!("No running timer to flush at exit");
        return None;
    }

    match load_run(store) {
        StoredRun::Running(record) => {
            let rebased = record.rebased(now);
            save_run(store, &rebased);
            info!(
                "Flushed timer at exit: {} cycles, {:.0}s into cycle",
                rebased.baseline.completed_cycles, rebased.baseline.accumulated_seconds
            );
            Some(rebased.baseline)
        }
        StoredRun::Absent => None,
        StoredRun::Malformed(reason) => {
            warn!("Skipping exit flush, stored run is malformed: {}", reason);
            None
        }
    }
}
