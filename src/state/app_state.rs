//! Shared host state handed to the HTTP handlers

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::TimerSnapshot;
use crate::{
    error::EngineError,
    tasks::{Command, EngineHandle},
};

/// Host state: the engine handle plus server metadata
#[derive(Debug)]
pub struct AppState {
    /// Handle to the single engine loop
    pub engine: EngineHandle,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Arc<Mutex<Option<String>>>,
    pub last_action_time: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl AppState {
    pub fn new(engine: EngineHandle, port: u16, host: String) -> Self {
        Self {
            engine,
            start_time: Instant::now(),
            port,
            host,
            last_action: Arc::new(Mutex::new(None)),
            last_action_time: Arc::new(Mutex::new(None)),
        }
    }

    /// Run a command on the engine and record it as the last action
    pub async fn dispatch(&self, command: Command) -> Result<TimerSnapshot, EngineError> {
        let action = command.name();
        info!("Dispatching {}", action);

        let snapshot = self.engine.send(command).await?;

        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }
        Ok(snapshot)
    }

    /// Fresh snapshot without recording an action
    pub async fn snapshot(&self) -> Result<TimerSnapshot, EngineError> {
        self.engine.refresh().await.inspect_err(|e| {
            warn!("Failed to refresh timer snapshot: {}", e);
        })
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }
}
