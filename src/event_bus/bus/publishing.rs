//! Publishing operations, carried over unchanged from the teacher's
//! `crawl_events::bus::publishing`.

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::config::BackpressureMode;
use crate::error::EventBusError;
use crate::event_bus::types::{BatchPublishResult, Event};

use super::core::EventBus;

impl EventBus {
    /// Publishes to every current subscriber, dropping the event if there
    /// are none. Never blocks.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::NoSubscribers`] if the channel has no
    /// subscribers at all (a `tokio::broadcast` send error).
    pub async fn publish(&self, event: Event) -> Result<usize, EventBusError> {
        if let Ok(subscriber_count) = self.sender.send(event) {
            if self.config.enable_metrics {
                self.metrics.increment_published();
                self.metrics.update_subscriber_count(subscriber_count);
                if subscriber_count == 0 {
                    self.metrics.increment_dropped();
                    log::debug!("published event but no active subscribers");
                }
            }
            Ok(subscriber_count)
        } else {
            if self.config.enable_metrics {
                self.metrics.increment_failed();
            }
            Err(EventBusError::NoSubscribers)
        }
    }

    /// Publishes respecting the configured [`BackpressureMode`].
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ChannelFull`] in `Error` mode at capacity,
    /// or [`EventBusError::PublishTimeout`]/[`EventBusError::Shutdown`] in
    /// `Block` mode if capacity never frees up or the bus shuts down first.
    pub async fn publish_with_backpressure(&self, event: Event) -> Result<usize, EventBusError> {
        match self.config.backpressure_mode {
            BackpressureMode::DropOldest => self.publish(event).await,

            BackpressureMode::Block => {
                let timeout_count = self.consecutive_timeouts.load(Ordering::Acquire);
                if timeout_count > 10 {
                    log::warn!(
                        "event bus circuit breaker open after {timeout_count} consecutive publish timeouts, falling back to drop-oldest"
                    );
                    return self.publish(event).await;
                }

                let publish_future = async {
                    loop {
                        if self.sender.len() < self.config.capacity {
                            break;
                        }
                        if self.is_shutdown() {
                            return Err(EventBusError::Shutdown);
                        }
                        let _ = tokio::time::timeout(
                            Duration::from_millis(5),
                            self.capacity_notify.notified(),
                        )
                        .await;
                    }

                    if let Ok(subscriber_count) = self.sender.send(event) {
                        if self.config.enable_metrics {
                            self.metrics.increment_published();
                            self.metrics.update_subscriber_count(subscriber_count);
                            if subscriber_count == 0 {
                                self.metrics.increment_dropped();
                            }
                        }
                        self.capacity_notify.notify_one();
                        Ok(subscriber_count)
                    } else {
                        if self.config.enable_metrics {
                            self.metrics.increment_failed();
                        }
                        Err(EventBusError::NoSubscribers)
                    }
                };

                match tokio::time::timeout(Duration::from_secs(30), publish_future).await {
                    Ok(Ok(count)) => {
                        self.consecutive_timeouts.store(0, Ordering::Release);
                        Ok(count)
                    }
                    Ok(Err(e)) => Err(e),
                    Err(_elapsed) => {
                        let new_count = self.consecutive_timeouts.fetch_add(1, Ordering::AcqRel) + 1;
                        log::warn!("event bus publish timeout #{new_count} after 30s waiting for capacity");
                        Err(EventBusError::PublishTimeout)
                    }
                }
            }

            BackpressureMode::Error => {
                let _guard = self.send_lock.lock().await;
                if self.sender.len() >= self.config.capacity {
                    return Err(EventBusError::ChannelFull);
                }
                if let Ok(subscriber_count) = self.sender.send(event) {
                    if self.config.enable_metrics {
                        self.metrics.increment_published();
                        self.metrics.update_subscriber_count(subscriber_count);
                        if subscriber_count == 0 {
                            self.metrics.increment_dropped();
                        }
                    }
                    Ok(subscriber_count)
                } else {
                    if self.config.enable_metrics {
                        self.metrics.increment_failed();
                    }
                    Err(EventBusError::NoSubscribers)
                }
            }
        }
    }

    /// Publishes every event in `events`, continuing past individual
    /// failures (no active subscribers) and reporting exactly how many
    /// succeeded.
    pub async fn publish_batch(&self, events: Vec<Event>) -> BatchPublishResult {
        let total = events.len();
        let mut published = 0;
        let mut failed = 0;
        let mut max_subscribers = 0;

        for event in events {
            if let Ok(count) = self.sender.send(event) {
                published += 1;
                max_subscribers = max_subscribers.max(count);
                if self.config.enable_metrics {
                    self.metrics.increment_published();
                    self.metrics.update_subscriber_count(count);
                    if count == 0 {
                        self.metrics.increment_dropped();
                    }
                }
            } else {
                failed += 1;
                if self.config.enable_metrics {
                    self.metrics.increment_failed();
                }
            }
        }

        BatchPublishResult {
            total,
            published,
            failed,
            max_subscribers,
        }
    }
}
