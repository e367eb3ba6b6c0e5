//! Autoscaled Pool (spec component G).
//!
//! A concurrency scaler that grows or shrinks the number of in-flight tasks
//! in response to [`crate::system_info::SystemStatus`] load samples, with an
//! optional whole-pool `maxTasksPerMinute` token bucket. The worker dispatch
//! loop is grounded on `orchestrator.rs`'s `FuturesUnordered` fan-in
//! (spawn while under capacity, otherwise await the next completion), and
//! the scale-up/scale-down step is grounded on `browser_pool/mod.rs`'s
//! `target_pool_size`/`scale_to_target` algorithm, generalized from
//! "browser instances" to "concurrent task slots".

mod rate_limiter;

pub use rate_limiter::{RateLimitDecision, TokenBucket};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::StreamExt;

use crate::cancellation::CancellationToken;
use crate::system_info::SystemStatus;

/// Supplies the next unit of work, or `None` if none is available right
/// now (the pool will back off briefly and ask again).
pub trait TaskSource<T>: Send + Sync {
    fn next_task(&self) -> BoxFuture<'_, Option<T>>;
}

pub struct AutoscaledPool {
    current_concurrency: AtomicUsize,
    min_concurrency: usize,
    max_concurrency: usize,
    desired_concurrency_ratio: f64,
    scale_interval: Duration,
    system_status: Arc<SystemStatus>,
    cpu_overload_threshold: f64,
    memory_overload_threshold: f64,
    rate_limiter: Option<TokenBucket>,
}

impl AutoscaledPool {
    pub fn new(
        min_concurrency: usize,
        max_concurrency: usize,
        desired_concurrency_ratio: f64,
        scale_interval: Duration,
        system_status: Arc<SystemStatus>,
        cpu_overload_threshold: f64,
        memory_overload_threshold: f64,
        max_tasks_per_minute: Option<u32>,
    ) -> Arc<Self> {
        Arc::new(Self {
            current_concurrency: AtomicUsize::new(min_concurrency),
            min_concurrency,
            max_concurrency,
            desired_concurrency_ratio,
            scale_interval,
            system_status,
            cpu_overload_threshold,
            memory_overload_threshold,
            rate_limiter: max_tasks_per_minute.map(TokenBucket::new),
        })
    }

    pub fn current_concurrency(&self) -> usize {
        self.current_concurrency.load(Ordering::Relaxed)
    }

    /// Adjusts `current_concurrency` by at most
    /// `desired_concurrency_ratio * max_concurrency` per call — the same
    /// bounded-step discipline the browser pool used when growing towards
    /// `target_pool_size`, so a single noisy sample can't swing capacity
    /// from min to max in one step.
    ///
    /// Scaling up only happens when the pool is saturated (`in_flight_count`
    /// has reached `current_concurrency`, spec.md §4.5) — otherwise the
    /// bottleneck is task availability, not concurrency, and raising the
    /// limit would just waste capacity headroom. Scaling down under load is
    /// unconditional: an overloaded sample should shed concurrency even if
    /// the pool happens to be under-saturated at the moment it's read.
    fn rescale(&self, in_flight_count: usize) {
        let Some(sample) = self.system_status.mean() else {
            return;
        };
        let step = ((self.max_concurrency as f64) * self.desired_concurrency_ratio)
            .ceil()
            .max(1.0) as usize;
        let current = self.current_concurrency.load(Ordering::Relaxed);
        let overloaded = sample.is_overloaded(self.cpu_overload_threshold, self.memory_overload_threshold);
        let saturated = in_flight_count >= current;

        let next = if overloaded {
            current.saturating_sub(step).max(self.min_concurrency)
        } else if saturated {
            (current + step).min(self.max_concurrency)
        } else {
            current
        };

        self.current_concurrency.store(next, Ordering::Relaxed);
    }

    /// Runs `handler` over tasks pulled from `source` until `cancel` fires
    /// and all in-flight work has drained. Spawns each task on its own
    /// `tokio` task so a slow handler cannot stall the dispatch loop.
    pub async fn run<T, H, Fut>(
        self: Arc<Self>,
        source: Arc<dyn TaskSource<T>>,
        handler: H,
        cancel: CancellationToken,
    ) where
        T: Send + 'static,
        H: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let mut in_flight = FuturesUnordered::new();
        let mut last_scale = Instant::now();

        loop {
            if cancel.is_cancelled() && in_flight.is_empty() {
                break;
            }

            if last_scale.elapsed() >= self.scale_interval {
                self.rescale(in_flight.len());
                last_scale = Instant::now();
            }

            let capacity = self.current_concurrency();
            let mut spawned = false;

            if !cancel.is_cancelled() && in_flight.len() < capacity {
                let rate_limited = self
                    .rate_limiter
                    .as_ref()
                    .is_some_and(|bucket| matches!(bucket.try_consume(), RateLimitDecision::Deny { .. }));

                if !rate_limited {
                    if let Some(task) = source.next_task().await {
                        let handler = handler.clone();
                        in_flight.push(tokio::spawn(async move {
                            handler(task).await;
                        }));
                        spawned = true;
                    }
                }
            }

            if !spawned {
                if in_flight.is_empty() {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                } else {
                    let _ = in_flight.next().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    struct VecSource {
        items: parking_lot::Mutex<Vec<u32>>,
    }

    impl TaskSource<u32> for VecSource {
        fn next_task(&self) -> BoxFuture<'_, Option<u32>> {
            Box::pin(async move { self.items.lock().pop() })
        }
    }

    #[tokio::test]
    async fn runs_all_tasks_then_stops_once_cancelled() {
        let status = SystemStatus::new(5);
        let pool = AutoscaledPool::new(
            1,
            4,
            0.5,
            Duration::from_millis(10),
            status,
            0.95,
            0.9,
            None,
        );
        let source = Arc::new(VecSource {
            items: parking_lot::Mutex::new(vec![1, 2, 3, 4, 5]),
        });
        let processed = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let processed_clone = processed.clone();
        let source_clone = source.clone();
        let cancel_clone = cancel.clone();
        let handle = tokio::spawn(pool.run(
            source.clone(),
            move |_item: u32| {
                let processed = processed_clone.clone();
                async move {
                    processed.fetch_add(1, Ordering::Relaxed);
                }
            },
            cancel.clone(),
        ));

        // wait for the queue to drain, then cancel
        loop {
            if source_clone.items.lock().is_empty() && processed.load(Ordering::Relaxed) == 5 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancel_clone.cancel();
        handle.await.unwrap();

        assert_eq!(processed.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn rescale_does_not_scale_up_when_pool_is_under_saturated() {
        let status = SystemStatus::new(5);
        status.sample(); // seed one low-load reading
        let pool = AutoscaledPool::new(1, 10, 0.5, Duration::from_millis(10), status, 0.95, 0.9, None);

        let before = pool.current_concurrency();
        pool.rescale(0); // nothing in flight: not saturated
        assert_eq!(pool.current_concurrency(), before);
    }

    #[test]
    fn rescale_scales_up_when_saturated_and_not_overloaded() {
        let status = SystemStatus::new(5);
        status.sample();
        let pool = AutoscaledPool::new(1, 10, 0.5, Duration::from_millis(10), status, 0.95, 0.9, None);

        let before = pool.current_concurrency();
        pool.rescale(before); // in-flight count equals current concurrency
        assert!(pool.current_concurrency() > before);
    }
}
