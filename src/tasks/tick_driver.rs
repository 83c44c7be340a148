//! Periodic tick source for the engine loop
//!
//! Ticks only ask the owner to re-derive state. At most one ticking task
//! exists; every (re)start bumps a generation so ticks already queued by a
//! cancelled task can be recognised and dropped.

use std::time::Duration;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::debug;

/// A tick emitted by the driver generation that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub generation: u64,
}

#[derive(Debug)]
pub struct TickDriver {
    period: Duration,
    tx: mpsc::Sender<Tick>,
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl TickDriver {
    pub fn new(period: Duration, tx: mpsc::Sender<Tick>) -> Self {
        Self {
            period,
            tx,
            generation: 0,
            handle: None,
        }
    }

    /// Replace any running ticker with a fresh one.
    pub fn start(&mut self) {
        self.cancel();
        self.generation += 1;

        let generation = self.generation;
        let period = self.period;
        let tx = self.tx.clone();
        self.handle = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tx.send(Tick { generation }).await.is_err() {
                    break;
                }
            }
        }));
        debug!("Tick driver started (generation {})", generation);
    }

    /// Start only if nothing is ticking.
    pub fn ensure_running(&mut self) {
        if !self.is_active() {
            self.start();
        }
    }

    /// Stop ticking. Returns whether a ticker was running.
    pub fn cancel(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                debug!("Tick driver cancelled (generation {})", self.generation);
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Whether `tick` came from the ticker that is currently running
    pub fn is_current(&self, tick: &Tick) -> bool {
        self.handle.is_some() && tick.generation == self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for TickDriver {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test(start_paused = true)]
    async fn ticks_every_period() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut driver = TickDriver::new(Duration::from_secs(1), tx);
        driver.start();

        let tick = rx.recv().await.unwrap();
        assert!(driver.is_current(&tick));
        let tick = rx.recv().await.unwrap();
        assert_eq!(tick.generation, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_does_not_leak_tickers() {
        let (tx, mut rx) = mpsc::channel(64);
        let mut driver = TickDriver::new(Duration::from_secs(1), tx);
        driver.start();
        driver.start();
        driver.start();
        assert_eq!(driver.generation(), 3);

        tokio::time::sleep(Duration::from_millis(5_500)).await;
        let mut received = Vec::new();
        while let Ok(tick) = rx.try_recv() {
            received.push(tick);
        }
        assert_eq!(received.len(), 5);
        assert!(received.iter().all(|t| driver.is_current(t)));
    }

    #[tokio::test(start_paused = true)]
    async fn ensure_running_keeps_existing_ticker() {
        let (tx, _rx) = mpsc::channel(8);
        let mut driver = TickDriver::new(Duration::from_secs(1), tx);
        driver.ensure_running();
        driver.ensure_running();
        assert_eq!(driver.generation(), 1);
        assert!(driver.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_ticks_and_marks_stale() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut driver = TickDriver::new(Duration::from_secs(1), tx);
        driver.start();
        let tick = rx.recv().await.unwrap();

        assert!(driver.cancel());
        assert!(!driver.cancel());
        assert!(!driver.is_current(&tick));
        assert!(timeout(Duration::from_secs(5), rx.recv()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn drop_stops_ticks() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut driver = TickDriver::new(Duration::from_secs(1), tx);
        driver.start();
        drop(driver);

        let outcome = timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(!matches!(outcome, Ok(Some(_))));
    }
}
