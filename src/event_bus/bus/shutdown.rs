//! Shutdown operations, carried over unchanged from the teacher's
//! `crawl_events::bus::shutdown`.

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::event_bus::types::{Event, ShutdownReason};

use super::core::EventBus;

impl EventBus {
    /// Idempotent; all clones of this bus share the same shutdown signal.
    pub fn shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::SeqCst);
        self.shutdown.notify_waiters();
        log::debug!("event bus shutdown signaled");
    }

    pub async fn wait_for_shutdown(&self) {
        self.shutdown.notified().await;
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::SeqCst)
    }

    /// Publishes the terminal `exit` event, gives subscribers a short
    /// drain window, then signals shutdown complete.
    pub async fn shutdown_gracefully(&self, reason: ShutdownReason) {
        log::info!("beginning graceful event bus shutdown: {reason:?}");
        self.shutdown_flag.store(true, Ordering::SeqCst);

        let _ = self.publish(Event::exit(reason)).await;

        tokio::time::sleep(Duration::from_millis(500)).await;
        self.shutdown.notify_waiters();
        log::info!("event bus shutdown complete");
    }
}
