//! External collaborators of the timer engine
//!
//! Storage, the wall clock and lifecycle notifications are injected into the
//! engine rather than reached as ambient globals.

pub mod clock;
pub mod lifecycle;
pub mod store;

// Re-export main types
pub use clock::{Clock, ManualClock, SystemClock};
pub use lifecycle::{LifecycleEvent, LifecycleSignal};
pub use store::{JsonFileStore, MemoryStore, PersistentStore};
