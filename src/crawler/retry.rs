//! Exponential retry backoff with jitter, carried over from the teacher's
//! `orchestrator::calculate_retry_backoff`, generalized to read its base
//! delay, cap, and jitter ratio from [`Configuration`] instead of hardcoded
//! constants, and to take a [`FailureKind`] multiplier from this crate's own
//! taxonomy instead of the teacher's.

use std::time::Duration;

use rand::Rng;

use crate::config::Configuration;

use super::failure::FailureKind;

/// `base * 2^(retry_count - 1) * failure_kind.delay_multiplier() * (1 ± jitter_ratio)`,
/// capped at `retry_max_delay`.
#[must_use]
pub fn backoff_for(retry_count: u32, failure_kind: FailureKind, config: &Configuration) -> Duration {
    let base_ms = config.retry_base_delay().as_millis() as f64;
    let exp = 2f64.powi(retry_count.min(10).saturating_sub(1) as i32);
    let adjusted = base_ms * exp * failure_kind.delay_multiplier();

    let jitter_ratio = config.retry_jitter_ratio();
    let jitter = rand::rng().random_range(-jitter_ratio..=jitter_ratio);
    let jittered = adjusted * (1.0 + jitter);

    let capped = jittered.min(config.retry_max_delay().as_millis() as f64).max(0.0);
    Duration::from_millis(capped as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_with_retry_count() {
        let config = Configuration::default();
        let first = backoff_for(1, FailureKind::NetworkTransient, &config);
        let third = backoff_for(3, FailureKind::NetworkTransient, &config);
        assert!(third > first);
    }

    #[test]
    fn backoff_never_exceeds_configured_cap() {
        let config = Configuration::default();
        let delay = backoff_for(10, FailureKind::Blocked, &config);
        assert!(delay <= config.retry_max_delay());
    }
}
