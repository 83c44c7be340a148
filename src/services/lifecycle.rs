//! Foreground/background lifecycle notifications

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Lifecycle transitions of the host process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    EnteringForeground,
    EnteringBackground,
}

/// Explicit lifecycle capability handed to the engine loop at construction.
///
/// Any number of sources (HTTP endpoints, the wake-up detector, a platform
/// bridge) may emit; each subscriber receives events in emission order.
#[derive(Debug, Clone)]
pub struct LifecycleSignal {
    tx: broadcast::Sender<LifecycleEvent>,
}

impl LifecycleSignal {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }

    /// Deliver an event to every current subscriber.
    pub fn emit(&self, event: LifecycleEvent) {
        if self.tx.send(event).is_err() {
            debug!("No lifecycle subscribers for {:?}", event);
        }
    }

    pub fn foreground(&self) {
        self.emit(LifecycleEvent::EnteringForeground);
    }

    pub fn background(&self) {
        self.emit(LifecycleEvent::EnteringBackground);
    }
}

impl Default for LifecycleSignal {
    fn default() -> Self {
        Self::new()
    }
}
