//! State management module
//!
//! Observable timer snapshots and the shared host state.

pub mod app_state;
pub mod timer_state;

// Re-export main types
pub use app_state::AppState;
pub use timer_state::{Dialog, TimerSnapshot};
