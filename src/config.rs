//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};
use clap::Parser;

use crate::{
    engine::{CyclePolicy, EngineSettings},
    tasks::LoopSettings,
};

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "habit-timer")]
#[command(about = "A durable habit-streak timer that survives suspension and restarts")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// JSON file holding the persisted timer record
    #[arg(short, long)]
    pub store: Option<PathBuf>,

    /// Label to use when none is stored yet
    #[arg(short, long)]
    pub label: Option<String>,

    /// Stop the timer once a full cycle completes instead of counting on
    #[arg(long)]
    pub stop_after_cycle: bool,

    /// Seconds an over-limit banner stays visible
    #[arg(long, default_value = "3")]
    pub alert_secs: u64,

    /// Tick period in milliseconds
    #[arg(long, default_value = "1000")]
    pub tick_ms: u64,

    /// Wake-up detection poll period in seconds
    #[arg(long, default_value = "15")]
    pub wake_poll_secs: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    /// Store location, defaulting to the platform data directory
    pub fn store_path(&self) -> PathBuf {
        self.store.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("habit-timer")
                .join("state.json")
        })
    }

    pub fn cycle_policy(&self) -> CyclePolicy {
        if self.stop_after_cycle {
            CyclePolicy::StopAfterCycle
        } else {
            CyclePolicy::Continuous
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            policy: self.cycle_policy(),
            initial_label: self.label.clone(),
        }
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            tick_period: Duration::from_millis(self.tick_ms.max(1)),
            alert_delay: Duration::from_secs(self.alert_secs),
        }
    }

    pub fn wake_poll(&self) -> Duration {
        Duration::from_secs(self.wake_poll_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["habit-timer"]).unwrap();
        assert_eq!(config.address(), "127.0.0.1:20554");
        assert_eq!(config.log_level(), "info");
        assert_eq!(config.cycle_policy(), CyclePolicy::Continuous);
        assert_eq!(config.loop_settings().tick_period, Duration::from_secs(1));
        assert_eq!(config.loop_settings().alert_delay, Duration::from_secs(3));
        assert!(config.store_path().ends_with("habit-timer/state.json"));
    }

    #[test]
    fn flags_map_to_settings() {
        let config = Config::try_parse_from([
            "habit-timer",
            "--stop-after-cycle",
            "--label",
            "no sugar",
            "--store",
            "/tmp/t.json",
            "-v",
        ])
        .unwrap();
        assert_eq!(config.cycle_policy(), CyclePolicy::StopAfterCycle);
        assert_eq!(config.engine_settings().initial_label.as_deref(), Some("no sugar"));
        assert_eq!(config.store_path(), PathBuf::from("/tmp/t.json"));
        assert_eq!(config.log_level(), "debug");
    }
}
