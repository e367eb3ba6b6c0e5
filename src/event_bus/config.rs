//! Configuration for the event bus, carried over unchanged from the
//! teacher's `crawl_events::config` (backpressure modes, overload
//! threshold, metrics toggle) — spec.md §4.6 only requires best-effort
//! delivery, the `DropOldest` default here, but the other modes are
//! ambient robustness a non-goal never excludes.

pub use crate::config::BackpressureMode;

#[derive(Debug, Clone)]
pub struct EventBusConfig {
    pub capacity: usize,
    pub backpressure_mode: BackpressureMode,
    pub overload_threshold: f64,
    pub enable_metrics: bool,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            backpressure_mode: BackpressureMode::DropOldest,
            overload_threshold: 0.8,
            enable_metrics: true,
        }
    }
}
