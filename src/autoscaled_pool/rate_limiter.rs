//! Lock-free token bucket, carried over from the teacher's
//! `crawl_engine/rate_limiter.rs` almost verbatim: same packed-`u128`
//! state word (tokens in the upper 64 bits, last-refill-nanos in the
//! lower 64), same cache-line-aligned layout, same CAS-loop refill/consume
//! pair. Rekeyed from "one bucket per domain" to "one bucket per pool",
//! since `maxTasksPerMinute` is a whole-pool budget, not a per-domain one.

use std::sync::atomic::{AtomicU128, Ordering};
use std::time::{Duration, Instant};

const TOKEN_SCALE: u64 = 1000;
const RATE_SCALE: u64 = 1_000_000;

#[inline(always)]
fn pack_state(tokens: u64, last_refill_nanos: u64) -> u128 {
    ((tokens as u128) << 64) | (last_refill_nanos as u128)
}

#[inline(always)]
fn unpack_state(packed: u128) -> (u64, u64) {
    let tokens = (packed >> 64) as u64;
    let last_refill_nanos = (packed & 0xFFFF_FFFF_FFFF_FFFF) as u64;
    (tokens, last_refill_nanos)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allow,
    Deny { retry_after: Duration },
}

#[repr(C, align(64))]
pub struct TokenBucket {
    state: AtomicU128,
    rate_per_nano: u64,
    max_tokens: u64,
    base_time: Instant,
    _padding: [u8; 16],
}

impl TokenBucket {
    /// `rate_per_minute` tokens are available to consume per minute, up to
    /// a burst of one minute's worth of tokens.
    pub fn new(rate_per_minute: u32) -> Self {
        let rate_per_second = f64::from(rate_per_minute) / 60.0;
        let max_tokens = (rate_per_second.max(1.0) * TOKEN_SCALE as f64) as u64;
        let rate_per_nano =
            ((rate_per_second * TOKEN_SCALE as f64 * RATE_SCALE as f64) / 1_000_000_000.0) as u64;
        let base_time = Instant::now();
        Self {
            state: AtomicU128::new(pack_state(max_tokens, 0)),
            rate_per_nano,
            max_tokens,
            base_time,
            _padding: [0u8; 16],
        }
    }

    pub fn try_consume(&self) -> RateLimitDecision {
        let now_nanos = self.base_time.elapsed().as_nanos() as u64;
        self.refill(now_nanos);

        let mut current_state = self.state.load(Ordering::Relaxed);
        loop {
            let (current_tokens, last_refill) = unpack_state(current_state);
            if current_tokens < TOKEN_SCALE {
                let tokens_needed = TOKEN_SCALE.saturating_sub(current_tokens);
                let nanos_needed = if self.rate_per_nano > 0 {
                    (tokens_needed.saturating_mul(RATE_SCALE)) / self.rate_per_nano
                } else {
                    1_000_000
                };
                return RateLimitDecision::Deny {
                    retry_after: Duration::from_nanos(nanos_needed),
                };
            }

            let new_tokens = current_tokens - TOKEN_SCALE;
            let new_state = pack_state(new_tokens, last_refill);
            match self.state.compare_exchange_weak(
                current_state,
                new_state,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return RateLimitDecision::Allow,
                Err(actual) => {
                    current_state = actual;
                    std::hint::spin_loop();
                }
            }
        }
    }

    fn refill(&self, now_nanos: u64) {
        let mut current_state = self.state.load(Ordering::Relaxed);
        loop {
            let (current_tokens, last_refill) = unpack_state(current_state);
            if now_nanos <= last_refill {
                return;
            }
            let elapsed_nanos = now_nanos.saturating_sub(last_refill);
            let tokens_to_add = (elapsed_nanos.saturating_mul(self.rate_per_nano)) / RATE_SCALE;
            let time_credited_nanos = if self.rate_per_nano > 0 {
                (tokens_to_add.saturating_mul(RATE_SCALE)) / self.rate_per_nano
            } else {
                0
            };
            let new_last_refill = last_refill.saturating_add(time_credited_nanos);
            let new_tokens = if tokens_to_add > 0 {
                current_tokens.saturating_add(tokens_to_add).min(self.max_tokens)
            } else {
                current_tokens
            };
            let new_state = pack_state(new_tokens, new_last_refill);
            match self.state.compare_exchange_weak(
                current_state,
                new_state,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => {
                    current_state = actual;
                    std::hint::spin_loop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_burst_up_to_one_minute_of_tokens() {
        let bucket = TokenBucket::new(60);
        for _ in 0..60 {
            assert_eq!(bucket.try_consume(), RateLimitDecision::Allow);
        }
    }

    #[test]
    fn denies_once_budget_is_exhausted() {
        let bucket = TokenBucket::new(1);
        assert_eq!(bucket.try_consume(), RateLimitDecision::Allow);
        assert!(matches!(
            bucket.try_consume(),
            RateLimitDecision::Deny { .. }
        ));
    }
}
