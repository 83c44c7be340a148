//! API request and response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::TimerSnapshot;

/// API response structure for state change endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub timer: TimerSnapshot,
}

impl ApiResponse {
    /// Create a new API response
    pub fn new(status: String, message: String, timer: TimerSnapshot) -> Self {
        Self {
            status,
            message,
            timestamp: Utc::now(),
            timer,
        }
    }

    /// Status derived from whether the timer is running
    pub fn from_timer(message: impl Into<String>, timer: TimerSnapshot) -> Self {
        let status = if timer.is_running { "running" } else { "stopped" };
        Self::new(status.to_string(), message.into(), timer)
    }

    /// A command the engine declined to act on
    pub fn ignored(message: impl Into<String>, timer: TimerSnapshot) -> Self {
        Self::new("ignored".to_string(), message.into(), timer)
    }
}

/// Body of the text-editing endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextInput {
    pub value: String,
}

/// Status response with server metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub timer: TimerSnapshot,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
