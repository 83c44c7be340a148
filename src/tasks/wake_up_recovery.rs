//! Wake-up recovery background task

use std::{sync::Arc, time::Duration};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::services::{Clock, LifecycleSignal};

/// Background task that detects host suspension and signals a foreground transition.
///
/// Monotonic time stops while the machine sleeps but wall-clock time does
/// not, so a wall-clock gap well beyond the monotonic gap between two polls
/// means the host was suspended in between.
pub async fn wake_up_recovery_task(
    clock: Arc<dyn Clock>,
    lifecycle: LifecycleSignal,
    poll: Duration,
) {
    info!("Starting wake-up recovery task (poll every {:?})", poll);

    let mut ticker = interval(poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    let mut last_wall = clock.now();
    let mut last_mono = Instant::now();

    loop {
        ticker.tick().await;

        let wall = clock.now();
        let mono = Instant::now();
        let wall_gap = wall.signed_duration_since(last_wall);
        let mono_gap = mono.duration_since(last_mono);

        if suspended_between(wall_gap, mono_gap, poll) {
            info!(
                "System wake-up detected ({}s of wall time in {:?}), signalling foreground",
                wall_gap.num_seconds(),
                mono_gap
            );
            lifecycle.foreground();
        } else {
            debug!("No suspension since last poll");
        }

        last_wall = wall;
        last_mono = mono;
    }
}

/// Whether wall-clock time ran ahead of monotonic time by more than one poll.
pub fn suspended_between(
    wall_gap: chrono::Duration,
    mono_gap: Duration,
    poll: Duration,
) -> bool {
    let drift_ms = wall_gap.num_milliseconds() - mono_gap.as_millis() as i64;
    drift_ms > poll.as_millis() as i64
}
