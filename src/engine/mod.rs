//! Durable elapsed-time engine
//!
//! Pure reconciliation arithmetic, the persisted record contract, and the
//! state machine that ties them together.

pub mod reconcile;
pub mod record;
pub mod timer_engine;

pub use reconcile::{reconcile, Progress, CYCLE_LENGTH_SECONDS};
pub use record::{flush_at_exit, RunRecord, StoredRun};
pub use timer_engine::{
    CyclePolicy, EngineSettings, TimerEngine, LABEL_MAX_LENGTH, RESTART_REASON_MAX_LENGTH,
};
