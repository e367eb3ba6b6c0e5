//! Metrics reporting, carried over unchanged from the teacher's
//! `crawl_events::bus::metrics_reporting`.

use crate::event_bus::metrics::MetricsSnapshot;

use super::core::EventBus;

impl EventBus {
    #[must_use]
    pub fn get_metrics_report(&self) -> String {
        if !self.config.enable_metrics {
            return "metrics disabled".to_string();
        }
        let snapshot = self.metrics.snapshot();
        format!(
            "Event Bus Metrics:\n\
             - Events Published: {}\n\
             - Events Dropped: {}\n\
             - Events Failed: {}\n\
             - Active Subscribers: {}\n\
             - Peak Subscribers: {}\n\
             - Success Rate: {:.2}%",
            snapshot.events_published,
            snapshot.events_dropped,
            snapshot.events_failed,
            snapshot.active_subscribers,
            snapshot.peak_subscribers,
            snapshot.success_rate() * 100.0,
        )
    }
}
