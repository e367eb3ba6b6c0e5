//! Fluent builder for [`Configuration`], validated on `build()`.
//!
//! The teacher's `CrawlConfigBuilder` uses a typestate (`WithStorageDir`,
//! `WithStartUrl`, `Complete`) to force required fields at compile time.
//! Nothing here is required in the same sense — every knob has a sane
//! default — so a single builder type suffices, but the same
//! validate-everything-in-`build()` discipline is kept.

use std::time::Duration;

use crate::error::ConfigError;

use super::types::{BackpressureMode, Configuration};

#[derive(Debug, Clone)]
pub struct ConfigurationBuilder {
    inner: Configuration,
}

impl Default for ConfigurationBuilder {
    fn default() -> Self {
        Self {
            inner: Configuration::default(),
        }
    }
}

macro_rules! setter {
    ($name:ident, $field:ident, $ty:ty) => {
        #[must_use]
        pub fn $name(mut self, value: $ty) -> Self {
            self.inner.$field = value;
            self
        }
    };
}

impl ConfigurationBuilder {
    setter!(request_lease_timeout, request_lease_timeout, Duration);
    setter!(forward_progress_window, forward_progress_window, Duration);
    setter!(max_pool_size, max_pool_size, usize);
    setter!(session_max_age, session_max_age, Duration);
    setter!(session_max_usage_count, session_max_usage_count, u32);
    setter!(session_max_error_score, session_max_error_score, u32);
    setter!(
        proxy_tier_escalation_threshold,
        proxy_tier_escalation_threshold,
        u32
    );
    setter!(system_info_sample_interval, system_info_sample_interval, Duration);
    setter!(cpu_overload_threshold, cpu_overload_threshold, f64);
    setter!(memory_overload_threshold, memory_overload_threshold, f64);
    setter!(min_concurrency, min_concurrency, usize);
    setter!(max_concurrency, max_concurrency, usize);
    setter!(max_tasks_per_minute, max_tasks_per_minute, Option<u32>);
    setter!(event_bus_capacity, event_bus_capacity, usize);
    setter!(event_bus_backpressure, event_bus_backpressure, BackpressureMode);
    setter!(max_request_retries, max_request_retries, u32);
    setter!(retry_base_delay, retry_base_delay, Duration);
    setter!(retry_max_delay, retry_max_delay, Duration);
    setter!(circuit_breaker_enabled, circuit_breaker_enabled, bool);
    setter!(
        circuit_breaker_failure_threshold,
        circuit_breaker_failure_threshold,
        u32
    );

    /// Validates cross-field invariants and produces a [`Configuration`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `max_concurrency < min_concurrency`, or if
    /// any duration/threshold field is zero where a positive value is
    /// required.
    pub fn build(self) -> Result<Configuration, ConfigError> {
        let cfg = self.inner;

        if cfg.max_concurrency < cfg.min_concurrency {
            return Err(ConfigError::ConcurrencyRange {
                min: cfg.min_concurrency,
                max: cfg.max_concurrency,
            });
        }
        if cfg.min_concurrency == 0 {
            return Err(ConfigError::OutOfRange {
                field: "min_concurrency",
                minimum: 1,
                actual: 0,
            });
        }
        if cfg.forward_progress_window.is_zero() {
            return Err(ConfigError::OutOfRange {
                field: "forward_progress_window",
                minimum: 1,
                actual: 0,
            });
        }
        if cfg.max_pool_size == 0 {
            return Err(ConfigError::OutOfRange {
                field: "max_pool_size",
                minimum: 1,
                actual: 0,
            });
        }
        if !(0.0..=1.0).contains(&cfg.cpu_overload_threshold) {
            return Err(ConfigError::OutOfRange {
                field: "cpu_overload_threshold",
                minimum: 0,
                actual: cfg.cpu_overload_threshold as i64,
            });
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configuration_builds() {
        Configuration::builder().build().expect("defaults must be valid");
    }

    #[test]
    fn rejects_inverted_concurrency_range() {
        let err = Configuration::builder()
            .min_concurrency(10)
            .max_concurrency(2)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ConcurrencyRange { min: 10, max: 2 }));
    }
}
