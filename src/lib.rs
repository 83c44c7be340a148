//! Habit Timer - a durable habit-streak timer
//!
//! This library tracks elapsed wall-clock time since a habit was started,
//! counting full days ("cycles"). Progress is derived from an anchor instant
//! rather than accumulated tick by tick, so it survives suspension, process
//! death and relaunch without drift.

pub mod config;
pub mod error;
pub mod engine;
pub mod state;
pub mod api;
pub mod services;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use engine::{CyclePolicy, EngineSettings, Progress, TimerEngine};
pub use error::{EngineError, StoreError};
pub use state::{AppState, TimerSnapshot};
pub use api::create_router;
pub use utils::signals::shutdown_signal;
