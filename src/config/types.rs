//! `Configuration` — the tunable knobs for every crate component.
//!
//! Grouped by the module that reads them. `Configuration` itself is inert
//! data; it has no behavior and holds no shared handles, so it is cheap to
//! clone and safe to pass by value into constructors.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What an event bus does when a subscriber can't keep up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackpressureMode {
    /// Drop the oldest unread event for the lagging subscriber. Default;
    /// matches the event bus's "best-effort" delivery contract.
    DropOldest,
    /// Block the publisher until the subscriber catches up.
    Block,
    /// Return an error to the publisher instead of dropping or blocking.
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    // --- Request Queue ---
    /// Window after which a leased-but-unresolved request is considered
    /// stalled and reclaimed back onto the queue.
    pub(crate) request_lease_timeout: Duration,
    /// Window of queue-head consistency required before `is_finished`
    /// can report true (guards against a storage client that is still
    /// catching up on recently-committed writes).
    pub(crate) forward_progress_window: Duration,

    // --- Session Pool ---
    pub(crate) max_pool_size: usize,
    pub(crate) session_max_age: Duration,
    pub(crate) session_max_usage_count: u32,
    pub(crate) session_max_error_score: u32,
    pub(crate) session_maintenance_interval: Duration,

    // --- Proxy Configuration ---
    /// Consecutive blocked-classification failures against the same
    /// (session, tier) pair before the next tier is tried.
    pub(crate) proxy_tier_escalation_threshold: u32,

    // --- System-Load Snapshot ---
    pub(crate) system_info_sample_interval: Duration,
    pub(crate) system_info_history_len: usize,
    pub(crate) cpu_overload_threshold: f64,
    pub(crate) memory_overload_threshold: f64,

    // --- Autoscaled Pool ---
    pub(crate) min_concurrency: usize,
    pub(crate) max_concurrency: usize,
    pub(crate) desired_concurrency_ratio: f64,
    pub(crate) max_tasks_per_minute: Option<u32>,
    pub(crate) scale_interval: Duration,

    // --- Event Bus ---
    pub(crate) event_bus_capacity: usize,
    pub(crate) event_bus_backpressure: BackpressureMode,
    pub(crate) event_bus_persist_state_interval: Duration,
    pub(crate) event_bus_system_info_interval: Duration,

    // --- Crawler Runtime ---
    pub(crate) max_request_retries: u32,
    pub(crate) retry_base_delay: Duration,
    pub(crate) retry_max_delay: Duration,
    pub(crate) retry_jitter_ratio: f64,
    pub(crate) circuit_breaker_enabled: bool,
    pub(crate) circuit_breaker_failure_threshold: u32,
    pub(crate) circuit_breaker_success_threshold: u32,
    pub(crate) circuit_breaker_half_open_timeout: Duration,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            request_lease_timeout: Duration::from_secs(300),
            forward_progress_window: Duration::from_secs(60),

            max_pool_size: 1000,
            session_max_age: Duration::from_secs(3000),
            session_max_usage_count: 50,
            session_max_error_score: 3,
            session_maintenance_interval: Duration::from_secs(10),

            proxy_tier_escalation_threshold: 3,

            system_info_sample_interval: Duration::from_secs(1),
            system_info_history_len: 60,
            cpu_overload_threshold: 0.95,
            memory_overload_threshold: 0.90,

            min_concurrency: 1,
            max_concurrency: 200,
            desired_concurrency_ratio: 0.05,
            max_tasks_per_minute: None,
            scale_interval: Duration::from_millis(500),

            event_bus_capacity: 1000,
            event_bus_backpressure: BackpressureMode::DropOldest,
            event_bus_persist_state_interval: Duration::from_secs(60),
            event_bus_system_info_interval: Duration::from_secs(1),

            max_request_retries: 3,
            retry_base_delay: Duration::from_millis(1000),
            retry_max_delay: Duration::from_millis(30_000),
            retry_jitter_ratio: 0.2,
            circuit_breaker_enabled: true,
            circuit_breaker_failure_threshold: 5,
            circuit_breaker_success_threshold: 2,
            circuit_breaker_half_open_timeout: Duration::from_secs(300),
        }
    }
}

impl Configuration {
    #[must_use]
    pub fn builder() -> super::ConfigurationBuilder {
        super::ConfigurationBuilder::default()
    }

    pub fn request_lease_timeout(&self) -> Duration {
        self.request_lease_timeout
    }

    pub fn forward_progress_window(&self) -> Duration {
        self.forward_progress_window
    }

    pub fn max_pool_size(&self) -> usize {
        self.max_pool_size
    }

    pub fn min_concurrency(&self) -> usize {
        self.min_concurrency
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn max_tasks_per_minute(&self) -> Option<u32> {
        self.max_tasks_per_minute
    }

    pub fn max_request_retries(&self) -> u32 {
        self.max_request_retries
    }

    pub fn retry_base_delay(&self) -> Duration {
        self.retry_base_delay
    }

    pub fn retry_max_delay(&self) -> Duration {
        self.retry_max_delay
    }

    pub fn retry_jitter_ratio(&self) -> f64 {
        self.retry_jitter_ratio
    }

    pub fn circuit_breaker_enabled(&self) -> bool {
        self.circuit_breaker_enabled
    }

    pub fn circuit_breaker_failure_threshold(&self) -> u32 {
        self.circuit_breaker_failure_threshold
    }

    pub fn circuit_breaker_success_threshold(&self) -> u32 {
        self.circuit_breaker_success_threshold
    }

    pub fn circuit_breaker_half_open_timeout(&self) -> Duration {
        self.circuit_breaker_half_open_timeout
    }

    pub fn proxy_tier_escalation_threshold(&self) -> u32 {
        self.proxy_tier_escalation_threshold
    }

    pub fn session_max_age(&self) -> Duration {
        self.session_max_age
    }

    pub fn session_max_usage_count(&self) -> u32 {
        self.session_max_usage_count
    }

    pub fn session_max_error_score(&self) -> u32 {
        self.session_max_error_score
    }

    pub fn system_info_sample_interval(&self) -> Duration {
        self.system_info_sample_interval
    }

    pub fn system_info_history_len(&self) -> usize {
        self.system_info_history_len
    }

    pub fn cpu_overload_threshold(&self) -> f64 {
        self.cpu_overload_threshold
    }

    pub fn memory_overload_threshold(&self) -> f64 {
        self.memory_overload_threshold
    }

    pub fn desired_concurrency_ratio(&self) -> f64 {
        self.desired_concurrency_ratio
    }

    pub fn scale_interval(&self) -> Duration {
        self.scale_interval
    }

    pub fn event_bus_capacity(&self) -> usize {
        self.event_bus_capacity
    }

    pub fn event_bus_backpressure(&self) -> BackpressureMode {
        self.event_bus_backpressure
    }

    pub fn event_bus_persist_state_interval(&self) -> Duration {
        self.event_bus_persist_state_interval
    }

    pub fn event_bus_system_info_interval(&self) -> Duration {
        self.event_bus_system_info_interval
    }

    pub fn session_maintenance_interval(&self) -> Duration {
        self.session_maintenance_interval
    }
}
