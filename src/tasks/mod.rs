//! Background tasks module
//!
//! This module contains the engine loop and the tasks that feed it.

pub mod alert_throttle;
pub mod engine_loop;
pub mod tick_driver;
pub mod wake_up_recovery;

// Re-export main types and functions
pub use alert_throttle::AlertThrottle;
pub use engine_loop::{Command, EngineHandle, EngineLoop, LoopSettings};
pub use tick_driver::{Tick, TickDriver};
pub use wake_up_recovery::wake_up_recovery_task;
