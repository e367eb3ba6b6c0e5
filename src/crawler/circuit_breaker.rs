//! Per-domain circuit breaker, carried over nearly unchanged from the
//! teacher's `crawl_engine::circuit_breaker`. Folded into the crawler
//! runtime as an internal collaborator distinct from the per-request retry
//! policy: it short-circuits further attempts against a domain that is
//! structurally failing, independent of any single request's retry count.

use dashmap::DashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    HalfOpen,
    Open,
}

#[derive(Debug, Clone)]
pub struct DomainHealth {
    pub consecutive_failures: u32,
    pub total_attempts: u32,
    pub total_successes: u32,
    pub last_success: Option<Instant>,
    pub last_opened: Option<Instant>,
    pub consecutive_successes_in_halfopen: u32,
    pub state: CircuitState,
}

impl DomainHealth {
    fn new() -> Self {
        Self {
            consecutive_failures: 0,
            total_attempts: 0,
            total_successes: 0,
            last_success: None,
            last_opened: None,
            consecutive_successes_in_halfopen: 0,
            state: CircuitState::Closed,
        }
    }
}

pub struct CircuitBreaker {
    domains: DashMap<String, DomainHealth>,
    failure_threshold: u32,
    success_threshold: u32,
    half_open_timeout: Duration,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(failure_threshold: u32, success_threshold: u32, half_open_timeout: Duration) -> Self {
        Self {
            domains: DashMap::new(),
            failure_threshold,
            success_threshold,
            half_open_timeout,
        }
    }

    /// Returns true if a request to `domain` should proceed.
    pub fn should_attempt(&self, domain: &str) -> bool {
        let mut health = self.domains.entry(domain.to_string()).or_insert_with(DomainHealth::new);

        match health.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if let Some(opened) = health.last_opened {
                    if opened.elapsed() >= self.half_open_timeout {
                        health.state = CircuitState::HalfOpen;
                        health.consecutive_successes_in_halfopen = 0;
                        log::info!("circuit breaker transitioning to half-open for domain {domain}");
                        return true;
                    }
                }
                false
            }
            CircuitState::HalfOpen => true,
        }
    }

    pub fn record_success(&self, domain: &str) {
        if let Some(mut health) = self.domains.get_mut(domain) {
            health.consecutive_failures = 0;
            health.total_successes += 1;
            health.total_attempts += 1;
            health.last_success = Some(Instant::now());

            if health.state == CircuitState::HalfOpen {
                health.consecutive_successes_in_halfopen += 1;
                if health.consecutive_successes_in_halfopen >= self.success_threshold {
                    health.state = CircuitState::Closed;
                    log::info!("circuit breaker closed for domain {domain}");
                }
            }
        }
    }

    pub fn record_failure(&self, domain: &str, error: &str) {
        let mut health = self.domains.entry(domain.to_string()).or_insert_with(DomainHealth::new);

        health.consecutive_failures += 1;
        health.total_attempts += 1;

        if health.consecutive_failures >= self.failure_threshold && health.state != CircuitState::Open {
            health.state = CircuitState::Open;
            health.last_opened = Some(Instant::now());
            health.consecutive_successes_in_halfopen = 0;
            log::warn!(
                "circuit breaker open for domain {domain} after {} consecutive failures: {error}",
                health.consecutive_failures
            );
        }
    }

    #[must_use]
    pub fn get_health(&self, domain: &str) -> Option<DomainHealth> {
        self.domains.get(domain).map(|r| r.value().clone())
    }
}

/// Extracts the host portion of a URL, for keying the circuit breaker and
/// proxy tier escalation by domain.
pub fn extract_domain(url_str: &str) -> Result<String, String> {
    url::Url::parse(url_str)
        .map_err(|e| format!("failed to parse url {url_str}: {e}"))?
        .host_str()
        .map(ToString::to_string)
        .ok_or_else(|| format!("url has no host: {url_str}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_consecutive_failures() {
        let cb = CircuitBreaker::new(3, 2, Duration::from_secs(60));
        for _ in 0..3 {
            cb.record_failure("example.com", "boom");
        }
        assert_eq!(cb.get_health("example.com").unwrap().state, CircuitState::Open);
        assert!(!cb.should_attempt("example.com"));
    }

    #[test]
    fn half_opens_after_timeout() {
        let cb = CircuitBreaker::new(1, 1, Duration::from_millis(20));
        cb.record_failure("example.com", "boom");
        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.should_attempt("example.com"));
        assert_eq!(cb.get_health("example.com").unwrap().state, CircuitState::HalfOpen);
    }
}
