//! Single-owner loop around the timer engine
//!
//! Commands, ticks and lifecycle events all funnel into one task, so the
//! engine is never mutated concurrently and persistence writes stay ordered.

use std::time::Duration;
use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use super::{
    alert_throttle::{AlertThrottle, DEFAULT_ALERT_DELAY},
    tick_driver::{Tick, TickDriver},
};
use crate::{
    engine::TimerEngine,
    error::EngineError,
    services::{LifecycleEvent, LifecycleSignal},
    state::TimerSnapshot,
};

/// User-facing commands accepted by the engine loop
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Stop,
    RequestRestart,
    ConfirmRestart,
    CancelRestart,
    RequestClose,
    ConfirmClose,
    CancelClose,
    EditLabel(String),
    EditRestartReason(String),
    Lifecycle(LifecycleEvent),
    /// Reconcile and report without changing anything else
    Refresh,
    Shutdown,
}

impl Command {
    /// Short name used for logging and last-action tracking
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Stop => "stop",
            Command::RequestRestart => "restart-request",
            Command::ConfirmRestart => "restart-confirm",
            Command::CancelRestart => "restart-cancel",
            Command::RequestClose => "close-request",
            Command::ConfirmClose => "close-confirm",
            Command::CancelClose => "close-cancel",
            Command::EditLabel(_) => "edit-label",
            Command::EditRestartReason(_) => "edit-restart-reason",
            Command::Lifecycle(LifecycleEvent::EnteringForeground) => "foreground",
            Command::Lifecycle(LifecycleEvent::EnteringBackground) => "background",
            Command::Refresh => "refresh",
            Command::Shutdown => "shutdown",
        }
    }
}

struct Envelope {
    command: Command,
    reply: oneshot::Sender<TimerSnapshot>,
}

/// Timing knobs for the loop
#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    pub tick_period: Duration,
    pub alert_delay: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs(1),
            alert_delay: DEFAULT_ALERT_DELAY,
        }
    }
}

/// Cloneable handle for sending commands to the engine loop
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Envelope>,
    snapshots: watch::Receiver<TimerSnapshot>,
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope").field("command", &self.command).finish()
    }
}

impl EngineHandle {
    /// Send a command and wait for the snapshot taken right after it ran.
    pub async fn send(&self, command: Command) -> Result<TimerSnapshot, EngineError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Envelope { command, reply })
            .await
            .map_err(|_| EngineError::Unavailable)?;
        response.await.map_err(|_| EngineError::Unavailable)
    }

    pub async fn start(&self) -> Result<TimerSnapshot, EngineError> {
        self.send(Command::Start).await
    }

    pub async fn stop(&self) -> Result<TimerSnapshot, EngineError> {
        self.send(Command::Stop).await
    }

    pub async fn edit_label(&self, value: impl Into<String>) -> Result<TimerSnapshot, EngineError> {
        self.send(Command::EditLabel(value.into())).await
    }

    pub async fn refresh(&self) -> Result<TimerSnapshot, EngineError> {
        self.send(Command::Refresh).await
    }

    /// Ask the loop to cancel its tasks, flush and exit.
    pub async fn shutdown(&self) -> Result<TimerSnapshot, EngineError> {
        self.send(Command::Shutdown).await
    }

    /// Latest published snapshot
    pub fn current(&self) -> TimerSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TimerSnapshot> {
        self.snapshots.clone()
    }
}

pub struct EngineLoop {
    engine: TimerEngine,
    commands: mpsc::Receiver<Envelope>,
    ticks: mpsc::Receiver<Tick>,
    driver: TickDriver,
    lifecycle: broadcast::Receiver<LifecycleEvent>,
    label_alert: AlertThrottle,
    label_alert_rx: watch::Receiver<bool>,
    reason_alert: AlertThrottle,
    reason_alert_rx: watch::Receiver<bool>,
    snapshot_tx: watch::Sender<TimerSnapshot>,
}

impl EngineLoop {
    /// Move `engine` into a new loop task and return a handle to it.
    ///
    /// A running engine (restored from the store) resumes ticking right away.
    pub fn spawn(
        engine: TimerEngine,
        lifecycle: &LifecycleSignal,
        settings: LoopSettings,
    ) -> (EngineHandle, JoinHandle<()>) {
        let (tx, commands) = mpsc::channel(32);
        let (tick_tx, ticks) = mpsc::channel(4);
        let (snapshot_tx, snapshots) = watch::channel(engine.snapshot());

        let label_alert = AlertThrottle::new(settings.alert_delay);
        let reason_alert = AlertThrottle::new(settings.alert_delay);

        let mut engine_loop = EngineLoop {
            engine,
            commands,
            ticks,
            driver: TickDriver::new(settings.tick_period, tick_tx),
            lifecycle: lifecycle.subscribe(),
            label_alert_rx: label_alert.subscribe(),
            label_alert,
            reason_alert_rx: reason_alert.subscribe(),
            reason_alert,
            snapshot_tx,
        };

        if engine_loop.engine.is_running() {
            info!("Restored a running timer, resuming ticks");
            engine_loop.driver.start();
        }
        engine_loop.publish();

        let task = tokio::spawn(engine_loop.run());
        (EngineHandle { tx, snapshots }, task)
    }

    async fn run(mut self) {
        info!("Engine loop started");
        let mut lifecycle_open = true;

        loop {
            tokio::select! {
                envelope = self.commands.recv() => {
                    let Some(Envelope { command, reply }) = envelope else {
                        info!("All engine handles dropped");
                        break;
                    };
                    let shutdown = command == Command::Shutdown;
                    let snapshot = self.handle_command(command);
                    if reply.send(snapshot).is_err() {
                        debug!("Command caller went away before the reply");
                    }
                    if shutdown {
                        break;
                    }
                }
                Some(tick) = self.ticks.recv() => {
                    if self.driver.is_current(&tick) {
                        self.engine.reconcile();
                        if !self.engine.is_running() {
                            self.driver.cancel();
                        }
                        self.publish();
                    } else {
                        debug!("Dropping stale tick from generation {}", tick.generation);
                    }
                }
                event = self.lifecycle.recv(), if lifecycle_open => {
                    match event {
                        Ok(event) => {
                            self.handle_lifecycle(event);
                            self.publish();
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!("Missed {} lifecycle events, reconciling", missed);
                            self.engine.reconcile();
                            self.publish();
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("Lifecycle signal closed");
                            lifecycle_open = false;
                        }
                    }
                }
                Ok(()) = self.label_alert_rx.changed() => {
                    self.publish();
                }
                Ok(()) = self.reason_alert_rx.changed() => {
                    self.publish();
                }
            }
        }

        self.driver.cancel();
        self.label_alert.reset();
        self.reason_alert.reset();
        self.engine.flush();
        self.publish();
        info!("Engine loop stopped");
    }

    fn handle_command(&mut self, command: Command) -> TimerSnapshot {
        debug!("Handling command {}", command.name());
        self.engine.reconcile();

        match command {
            Command::Start => {
                // Re-anchoring also re-phases the ticker.
                if self.engine.start() {
                    self.driver.start();
                }
            }
            Command::Stop => {
                self.engine.stop();
            }
            Command::RequestRestart => self.engine.request_restart(),
            Command::ConfirmRestart => {
                if self.engine.confirm_restart() && self.engine.is_running() {
                    self.driver.start();
                }
            }
            Command::CancelRestart => self.engine.cancel_restart(),
            Command::RequestClose => self.engine.request_close(),
            Command::ConfirmClose => {
                self.engine.confirm_close();
            }
            Command::CancelClose => self.engine.cancel_close(),
            Command::EditLabel(value) => {
                if self.engine.edit_label(&value) {
                    self.label_alert.trigger();
                }
            }
            Command::EditRestartReason(value) => {
                if self.engine.edit_restart_reason(&value) {
                    self.reason_alert.trigger();
                }
            }
            Command::Lifecycle(event) => self.handle_lifecycle(event),
            Command::Refresh | Command::Shutdown => {}
        }

        if !self.engine.is_running() {
            self.driver.cancel();
        }
        self.publish()
    }

    fn handle_lifecycle(&mut self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::EnteringForeground => {
                info!("Entering foreground");
                if self.engine.on_foreground() {
                    self.driver.ensure_running();
                }
            }
            LifecycleEvent::EnteringBackground => {
                info!("Entering background");
                self.engine.on_background();
                self.driver.cancel();
            }
        }
    }

    fn publish(&self) -> TimerSnapshot {
        let snapshot = self
            .engine
            .snapshot()
            .with_alerts(self.label_alert.is_visible(), self.reason_alert.is_visible());
        self.snapshot_tx.send_replace(snapshot.clone());
        snapshot
    }
}
