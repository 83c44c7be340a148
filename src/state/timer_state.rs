//! Observable timer state pushed to clients

use serde::{Deserialize, Serialize};

/// Confirmation dialog currently awaiting an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialog {
    #[default]
    None,
    Restart,
    Close,
}

/// Everything a client needs to render the timer screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub label: String,
    pub label_max_length: usize,
    /// A start is accepted only with a non-empty label
    pub can_start: bool,
    pub is_running: bool,
    pub has_ever_started: bool,
    /// Offer "restart" instead of "start"
    pub show_restart: bool,
    pub completed_cycles: u64,
    pub accumulated_seconds: f64,
    pub progress: f64,
    pub time_string: String,
    pub dialog: Dialog,
    pub restart_reason: String,
    pub restart_reason_max_length: usize,
    pub label_alert_visible: bool,
    pub restart_reason_alert_visible: bool,
}

impl TimerSnapshot {
    /// Copy with the banner flags filled in from the alert throttles
    pub fn with_alerts(mut self, label_alert: bool, reason_alert: bool) -> Self {
        self.label_alert_visible = label_alert;
        self.restart_reason_alert_visible = reason_alert;
        self
    }
}
