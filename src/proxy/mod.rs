//! Proxy Configuration (spec component E).
//!
//! Tiered proxy URLs with a stable per-session tier mapping and escalation
//! to the next tier after repeated blocked-classification failures.
//! Generalizes the teacher's `circuit_breaker.rs` per-domain consecutive
//! failure counter to a per-`(session_id, tier)` counter.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use dashmap::DashMap;

#[derive(Debug, Clone)]
pub struct ProxyTier {
    pub urls: Vec<String>,
}

pub struct ProxyConfiguration {
    tiers: Vec<ProxyTier>,
    escalation_threshold: u32,
    /// session_id -> current tier index
    session_tier: DashMap<String, usize>,
    /// (session_id, tier) -> consecutive failure count
    failures: DashMap<(String, usize), u32>,
}

impl ProxyConfiguration {
    pub fn new(tiers: Vec<ProxyTier>, escalation_threshold: u32) -> Self {
        Self {
            tiers,
            escalation_threshold,
            session_tier: DashMap::new(),
            failures: DashMap::new(),
        }
    }

    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    /// Returns the proxy URL for `session_id`, assigning it to tier 0 the
    /// first time it is seen. Stable: the same session keeps the same tier
    /// (until it escalates) and the same URL within that tier's list, since
    /// the URL is picked deterministically from a hash of `session_id`
    /// rather than a shared round-robin cursor — two calls for the same
    /// session with unchanged tier state always return the same URL
    /// (spec.md §4.3).
    pub fn proxy_url_for(&self, session_id: &str) -> Option<String> {
        if self.tiers.is_empty() {
            return None;
        }
        let tier_idx = *self
            .session_tier
            .entry(session_id.to_string())
            .or_insert(0);
        self.url_for_session_in_tier(session_id, tier_idx)
    }

    fn url_for_session_in_tier(&self, session_id: &str, tier_idx: usize) -> Option<String> {
        let tier = self.tiers.get(tier_idx)?;
        if tier.urls.is_empty() {
            return None;
        }
        let idx = stable_hash(session_id) as usize % tier.urls.len();
        Some(tier.urls[idx].clone())
    }

    /// Records a blocked-classification failure for `session_id` at its
    /// current tier. Escalates to the next tier (resetting the failure
    /// count) once `escalation_threshold` consecutive failures accrue.
    /// A no-op once already on the last tier.
    pub fn record_blocked(&self, session_id: &str) {
        let tier_idx = *self
            .session_tier
            .entry(session_id.to_string())
            .or_insert(0);
        let key = (session_id.to_string(), tier_idx);
        let count = {
            let mut entry = self.failures.entry(key).or_insert(0);
            *entry += 1;
            *entry
        };
        if count >= self.escalation_threshold && tier_idx + 1 < self.tiers.len() {
            self.session_tier.insert(session_id.to_string(), tier_idx + 1);
        }
    }

    /// Clears the failure count for `session_id` at its current tier; call
    /// on a successful (non-blocked) response.
    pub fn record_success(&self, session_id: &str) {
        if let Some(tier_idx) = self.session_tier.get(session_id).map(|t| *t) {
            self.failures.remove(&(session_id.to_string(), tier_idx));
        }
    }

    pub fn current_tier(&self, session_id: &str) -> usize {
        self.session_tier.get(session_id).map(|t| *t).unwrap_or(0)
    }
}

fn stable_hash(session_id: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    session_id.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_tier_config() -> ProxyConfiguration {
        ProxyConfiguration::new(
            vec![
                ProxyTier {
                    urls: vec!["http://tier0:8080".to_string()],
                },
                ProxyTier {
                    urls: vec!["http://tier1:8080".to_string()],
                },
            ],
            3,
        )
    }

    fn multi_url_tier_config() -> ProxyConfiguration {
        ProxyConfiguration::new(
            vec![ProxyTier {
                urls: vec![
                    "http://a:8080".to_string(),
                    "http://b:8080".to_string(),
                    "http://c:8080".to_string(),
                ],
            }],
            3,
        )
    }

    #[test]
    fn same_session_gets_the_same_url_across_repeated_calls() {
        let cfg = multi_url_tier_config();
        let first = cfg.proxy_url_for("s1");
        for _ in 0..10 {
            assert_eq!(cfg.proxy_url_for("s1"), first);
        }
    }

    #[test]
    fn different_sessions_can_land_on_different_urls() {
        let cfg = multi_url_tier_config();
        let urls: std::collections::HashSet<_> = (0..20)
            .map(|i| cfg.proxy_url_for(&format!("session-{i}")))
            .collect();
        assert!(urls.len() > 1);
    }

    #[test]
    fn session_escalates_after_threshold_blocked_responses() {
        let cfg = two_tier_config();
        cfg.proxy_url_for("s1");
        assert_eq!(cfg.current_tier("s1"), 0);
        for _ in 0..3 {
            cfg.record_blocked("s1");
        }
        assert_eq!(cfg.current_tier("s1"), 1);
    }

    #[test]
    fn does_not_escalate_past_last_tier() {
        let cfg = two_tier_config();
        for _ in 0..10 {
            cfg.record_blocked("s1");
        }
        assert_eq!(cfg.current_tier("s1"), 1);
    }

    #[test]
    fn success_resets_failure_count() {
        let cfg = two_tier_config();
        cfg.record_blocked("s1");
        cfg.record_blocked("s1");
        cfg.record_success("s1");
        cfg.record_blocked("s1");
        assert_eq!(cfg.current_tier("s1"), 0);
    }
}
