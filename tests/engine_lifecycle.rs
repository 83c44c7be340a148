use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeZone, Utc};
use habit_timer::{
    engine::{flush_at_exit, record::keys, EngineSettings, TimerEngine},
    services::{Clock, LifecycleSignal, ManualClock, MemoryStore, PersistentStore},
    state::Dialog,
    tasks::{Command, EngineHandle, EngineLoop, LoopSettings},
};
use tokio::time::{sleep, timeout};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 19, 8, 0, 0).unwrap()
}

struct Host {
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    lifecycle: LifecycleSignal,
}

impl Host {
    fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            clock: Arc::new(ManualClock::new(t0())),
            lifecycle: LifecycleSignal::new(),
        }
    }

    /// Simulates a process launch: load from the store and spawn the loop.
    fn launch(&self) -> EngineHandle {
        let engine = TimerEngine::load(
            self.store.clone(),
            self.clock.clone(),
            EngineSettings::default(),
        );
        let (handle, _task) = EngineLoop::spawn(engine, &self.lifecycle, LoopSettings::default());
        handle
    }
}

async fn ticking(handle: &EngineHandle) -> bool {
    let mut rx = handle.subscribe();
    rx.borrow_and_update();
    timeout(Duration::from_millis(1_500), rx.changed()).await.is_ok()
}

#[tokio::test(start_paused = true)]
async fn killed_process_relaunch_catches_up() {
    let host = Host::new();
    let handle = host.launch();
    handle.edit_label("no smoking").await.unwrap();
    let snap = handle.start().await.unwrap();
    assert!(snap.is_running);

    // Killed a day and 3h20m later without any teardown.
    host.clock.advance_secs(90_000);
    drop(handle);

    host.clock.advance_secs(500);
    let relaunched = host.launch();
    let snap = relaunched.current();
    assert!(snap.is_running);
    assert_eq!(snap.completed_cycles, 1);
    assert_eq!(snap.accumulated_seconds, 4_100.0);
    assert_eq!(snap.time_string, "01:08:20");
    assert_eq!(snap.label, "no smoking");
    assert!(ticking(&relaunched).await);
}

#[tokio::test(start_paused = true)]
async fn start_then_stop_relaunches_idle() {
    let host = Host::new();
    let handle = host.launch();
    handle.edit_label("walk").await.unwrap();
    handle.start().await.unwrap();
    let snap = handle.stop().await.unwrap();
    assert!(!snap.is_running);
    assert!(!host.store.contains(keys::ANCHOR_INSTANT));
    drop(handle);

    let relaunched = host.launch();
    let snap = relaunched.current();
    assert!(!snap.is_running);
    assert!(!snap.has_ever_started);
    assert_eq!(snap.completed_cycles, 0);
    assert!(!host.store.contains(keys::ANCHOR_INSTANT));
    assert!(!ticking(&relaunched).await);
}

#[tokio::test(start_paused = true)]
async fn confirmed_restart_keeps_running_from_zero() {
    let host = Host::new();
    let handle = host.launch();
    handle.edit_label("walk").await.unwrap();
    handle.start().await.unwrap();
    host.clock.advance_secs(200_000);

    let snap = handle.send(Command::RequestRestart).await.unwrap();
    assert_eq!(snap.dialog, Dialog::Restart);
    assert_eq!(snap.completed_cycles, 2);

    handle
        .send(Command::EditRestartReason("bad week".into()))
        .await
        .unwrap();
    let snap = handle.send(Command::ConfirmRestart).await.unwrap();
    assert!(snap.is_running);
    assert_eq!(snap.completed_cycles, 0);
    assert_eq!(snap.accumulated_seconds, 0.0);
    assert_eq!(snap.dialog, Dialog::None);
    assert_eq!(snap.restart_reason, "");

    let stored = host.store.get(keys::ANCHOR_INSTANT).unwrap();
    assert_eq!(stored.as_str().unwrap(), host.clock.now().to_rfc3339());
    assert!(ticking(&handle).await);
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_the_ticker() {
    let host = Host::new();
    let handle = host.launch();
    handle.edit_label("walk").await.unwrap();
    handle.start().await.unwrap();
    assert!(ticking(&handle).await);

    handle.stop().await.unwrap();
    let mut rx = handle.subscribe();
    rx.borrow_and_update();
    assert!(timeout(Duration::from_secs(5), rx.changed()).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn ticks_reconcile_against_the_clock() {
    let host = Host::new();
    let handle = host.launch();
    handle.edit_label("walk").await.unwrap();
    handle.start().await.unwrap();

    let mut rx = handle.subscribe();
    rx.borrow_and_update();
    host.clock.advance_secs(3_600);
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow().time_string, "01:00:00");
}

#[tokio::test(start_paused = true)]
async fn label_alert_fires_once_per_crossing_and_hides() {
    let host = Host::new();
    let handle = host.launch();
    let a = |n: usize| "a".repeat(n);

    let snap = handle.edit_label(a(17)).await.unwrap();
    assert!(!snap.label_alert_visible);

    let snap = handle.edit_label(a(18)).await.unwrap();
    assert!(snap.label_alert_visible);
    assert_eq!(snap.label.chars().count(), 17);

    sleep(Duration::from_secs(2)).await;
    let snap = handle.edit_label(a(19)).await.unwrap();
    assert!(snap.label_alert_visible);

    // No retrigger happened on the 19-char edit, so the banner hides 3s after the first.
    sleep(Duration::from_millis(1_100)).await;
    assert!(!handle.current().label_alert_visible);

    handle.edit_label(a(16)).await.unwrap();
    let snap = handle.edit_label(a(18)).await.unwrap();
    assert!(snap.label_alert_visible);
}

#[tokio::test(start_paused = true)]
async fn background_then_kill_preserves_progress() {
    let host = Host::new();
    let handle = host.launch();
    handle.edit_label("walk").await.unwrap();
    handle.start().await.unwrap();

    host.clock.advance_secs(1_000);
    host.lifecycle.background();
    sleep(Duration::from_millis(1)).await;
    let snap = handle.refresh().await.unwrap();
    assert_eq!(snap.accumulated_seconds, 1_000.0);
    assert!(!ticking(&handle).await);

    host.lifecycle.foreground();
    sleep(Duration::from_millis(1)).await;
    assert!(ticking(&handle).await);
    drop(handle);

    host.clock.advance_secs(2_000);
    let flushed = flush_at_exit(host.store.as_ref(), host.clock.now()).unwrap();
    assert_eq!(flushed.accumulated_seconds, 3_000.0);

    let relaunched = host.launch();
    assert_eq!(relaunched.current().accumulated_seconds, 3_000.0);
}

#[tokio::test(start_paused = true)]
async fn start_without_label_is_ignored() {
    let host = Host::new();
    let handle = host.launch();
    let snap = handle.start().await.unwrap();
    assert!(!snap.is_running);
    assert!(!snap.can_start);
    assert!(host.store.is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_loop() {
    let host = Host::new();
    let handle = host.launch();
    handle.edit_label("walk").await.unwrap();
    handle.start().await.unwrap();

    handle.shutdown().await.unwrap();
    sleep(Duration::from_millis(10)).await;
    assert!(handle.refresh().await.is_err());
}
