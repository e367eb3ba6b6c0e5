//! `Default`, `Clone`, and `Drop` impls, carried over unchanged from the
//! teacher's `crawl_events::bus::impls`. `num_instances` mirrors the
//! refcount tokio's own `broadcast::Sender` keeps internally.

use std::sync::atomic::Ordering;

use crate::event_bus::config::EventBusConfig;

use super::core::EventBus;

impl Default for EventBus {
    fn default() -> Self {
        Self::with_config(EventBusConfig::default())
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        self.num_instances.fetch_add(1, Ordering::AcqRel);
        Self {
            sender: self.sender.clone(),
            config: self.config.clone(),
            metrics: self.metrics.clone(),
            shutdown: self.shutdown.clone(),
            shutdown_flag: self.shutdown_flag.clone(),
            capacity_notify: self.capacity_notify.clone(),
            send_lock: self.send_lock.clone(),
            consecutive_timeouts: self.consecutive_timeouts.clone(),
            num_instances: self.num_instances.clone(),
        }
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        if self.num_instances.fetch_sub(1, Ordering::AcqRel) == 1 {
            log::debug!("last event bus handle dropped, signaling shutdown");
            self.shutdown_flag.store(true, Ordering::SeqCst);
            self.shutdown.notify_waiters();
        }
    }
}
