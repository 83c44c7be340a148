//! One-shot banner with a debounced auto-hide

use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle, time::sleep};
use tracing::debug;

/// Default time a banner stays up after the last trigger
pub const DEFAULT_ALERT_DELAY: Duration = Duration::from_secs(3);

/// Shows a banner and hides it after a delay measured from the latest trigger.
///
/// `Idle -> Visible(pending hide)`; a retrigger while visible keeps the
/// banner up and replaces the pending hide instead of stacking another one.
#[derive(Debug)]
pub struct AlertThrottle {
    delay: Duration,
    visible: Arc<watch::Sender<bool>>,
    pending_hide: Option<JoinHandle<()>>,
}

impl AlertThrottle {
    pub fn new(delay: Duration) -> Self {
        let (visible, _) = watch::channel(false);
        Self {
            delay,
            visible: Arc::new(visible),
            pending_hide: None,
        }
    }

    /// Watch banner visibility
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.visible.subscribe()
    }

    pub fn is_visible(&self) -> bool {
        *self.visible.borrow()
    }

    /// Show the banner (if hidden) and restart the hide countdown.
    pub fn trigger(&mut self) {
        if !self.is_visible() {
            debug!("Showing alert banner");
            self.visible.send_replace(true);
        }

        self.cancel_pending();
        let visible = Arc::clone(&self.visible);
        let delay = self.delay;
        self.pending_hide = Some(tokio::spawn(async move {
            sleep(delay).await;
            visible.send_replace(false);
            debug!("Alert banner hidden");
        }));
    }

    /// Cancel any pending hide so no callback fires after teardown.
    ///
    /// Visibility is left frozen as it is; this does not hide the banner.
    /// Meant for teardown only.
    pub fn reset(&mut self) {
        self.cancel_pending();
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending_hide.take() {
            handle.abort();
        }
    }
}

impl Default for AlertThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_DELAY)
    }
}

impl Drop for AlertThrottle {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
