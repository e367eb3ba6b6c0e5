//! Request Queue (spec component C).
//!
//! Dedup + FIFO-with-forefront + per-item leasing, on top of a
//! [`StorageClient`]. Grounded on the teacher's `orchestrator.rs` main loop
//! (queue + retry-queue draining, dual-queue termination check) and
//! `retry_queue.rs`'s grouped, two-pass `drain_ready` shape, generalized
//! into a single queue keyed by `unique_key` in a `DashMap` instead of
//! grouped by domain.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::QueueError;
use crate::request::{Placement, Request, RequestState};
use crate::storage::StorageClient;

struct Lease {
    leased_at: Instant,
}

pub struct RequestQueue {
    storage: Arc<dyn StorageClient>,
    /// unique_keys waiting to be leased, front = next out.
    pending: Mutex<VecDeque<String>>,
    in_progress: DashMap<String, Lease>,
    lease_timeout: Duration,
    forward_progress_window: Duration,
    handled_count: AtomicU64,
    last_mutation: Mutex<Instant>,
    notify: Notify,
}

impl RequestQueue {
    pub fn new(storage: Arc<dyn StorageClient>, lease_timeout: Duration, forward_progress_window: Duration) -> Self {
        let pending = storage
            .all()
            .into_iter()
            .filter(|r| matches!(r.state, RequestState::Pending | RequestState::Retrying))
            .map(|r| r.unique_key)
            .collect();
        Self {
            storage,
            pending: Mutex::new(pending),
            in_progress: DashMap::new(),
            lease_timeout,
            forward_progress_window,
            handled_count: AtomicU64::new(0),
            last_mutation: Mutex::new(Instant::now()),
            notify: Notify::new(),
        }
    }

    fn touch(&self) {
        *self.last_mutation.lock() = Instant::now();
    }

    /// Adds a request to the queue. Returns `Ok(false)` without enqueuing if
    /// a request with the same `unique_key` is already known (whether
    /// pending, leased, or already handled) — the dedup guarantee.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Storage`] if the backing store fails.
    pub fn add_request(&self, request: Request) -> Result<bool, QueueError> {
        let key = request.unique_key.clone();
        let forefront = request.is_forefront();
        let inserted = self.storage.put_if_absent(request)?;
        if inserted {
            let mut pending = self.pending.lock();
            if forefront {
                pending.push_front(key);
            } else {
                pending.push_back(key);
            }
            drop(pending);
            self.touch();
            self.notify.notify_one();
        }
        Ok(inserted)
    }

    pub fn add_requests(&self, requests: impl IntoIterator<Item = Request>) -> Result<usize, QueueError> {
        let mut added = 0;
        for request in requests {
            if self.add_request(request)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Leases the next pending request, reclaiming any lease that has
    /// exceeded `lease_timeout` first. Returns `None` if the queue has no
    /// work available right now.
    pub fn fetch_next_request(&self) -> Option<Request> {
        self.reclaim_stale_leases();
        let key = self.pending.lock().pop_front()?;
        let mut request = self.storage.get(&key)?;
        request.state = RequestState::Leased;
        request.leased_at = Some(SystemTime::now());
        let _ = self.storage.update(request.clone());
        self.in_progress.insert(
            key,
            Lease {
                leased_at: Instant::now(),
            },
        );
        self.touch();
        Some(request)
    }

    /// Waits until a request is available or `timeout` elapses, then leases
    /// it. Used by the autoscaled pool's worker loop instead of busy-polling.
    pub async fn fetch_next_request_wait(&self, timeout: Duration) -> Option<Request> {
        if let Some(req) = self.fetch_next_request() {
            return Some(req);
        }
        let _ = tokio::time::timeout(timeout, self.notify.notified()).await;
        self.fetch_next_request()
    }

    fn reclaim_stale_leases(&self) {
        let stale: Vec<String> = self
            .in_progress
            .iter()
            .filter(|entry| entry.value().leased_at.elapsed() >= self.lease_timeout)
            .map(|entry| entry.key().clone())
            .collect();
        for key in stale {
            self.in_progress.remove(&key);
            if let Some(mut request) = self.storage.get(&key) {
                request.state = RequestState::Pending;
                request.leased_at = None;
                let _ = self.storage.update(request);
            }
            self.pending.lock().push_back(key);
        }
    }

    /// Marks a leased request as permanently handled, removing it from the
    /// in-progress set. Errors if the key is not currently leased.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NotLeased`] if `unique_key` is not leased.
    pub fn mark_request_handled(&self, unique_key: &str) -> Result<(), QueueError> {
        self.in_progress
            .remove(unique_key)
            .ok_or_else(|| QueueError::NotLeased(unique_key.to_string()))?;
        if let Some(mut request) = self.storage.get(unique_key) {
            request.state = RequestState::Handled;
            request.handled_at = Some(SystemTime::now());
            let _ = self.storage.update(request);
        }
        self.handled_count.fetch_add(1, Ordering::Relaxed);
        self.touch();
        Ok(())
    }

    /// Ends a request's lease as permanently errored without retrying —
    /// used for non-retryable failures and retry-limit exhaustion reached
    /// outside [`Self::reclaim_request`] (spec.md §4.7: "mark request DONE,
    /// not RECLAIMED, to avoid loops").
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NotLeased`] if `unique_key` is not leased.
    pub fn mark_request_failed(&self, unique_key: &str, error_message: &str) -> Result<(), QueueError> {
        self.in_progress
            .remove(unique_key)
            .ok_or_else(|| QueueError::NotLeased(unique_key.to_string()))?;
        if let Some(mut request) = self.storage.get(unique_key) {
            request.push_error_message(error_message);
            request.state = RequestState::Errored;
            request.handled_at = Some(SystemTime::now());
            self.storage.update(request)?;
        }
        self.handled_count.fetch_add(1, Ordering::Relaxed);
        self.touch();
        Ok(())
    }

    /// Returns a failed request to the queue for retry, incrementing its
    /// `retry_count`, or marks it permanently errored if `max_retries` has
    /// been reached or `request.no_retry` is set. `placement` controls
    /// whether the retry goes to the front (useful for session-rotation
    /// retries that should be attempted again soon) or the back.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NotLeased`] if `unique_key` is not leased.
    pub fn reclaim_request(
        &self,
        unique_key: &str,
        placement: Placement,
        error_message: Option<&str>,
    ) -> Result<Request, QueueError> {
        self.in_progress
            .remove(unique_key)
            .ok_or_else(|| QueueError::NotLeased(unique_key.to_string()))?;
        let mut request = self
            .storage
            .get(unique_key)
            .ok_or_else(|| QueueError::NotLeased(unique_key.to_string()))?;

        request.retry_count += 1;
        request.leased_at = None;
        if let Some(message) = error_message {
            request.push_error_message(message);
        }
        let exhausted = request.no_retry
            || request
                .max_retries
                .map(|max| request.retry_count > max)
                .unwrap_or(false);

        if exhausted {
            request.state = RequestState::Errored;
            request.handled_at = Some(SystemTime::now());
            self.storage.update(request.clone())?;
            self.touch();
            return Ok(request);
        }

        request.state = RequestState::Retrying;
        self.storage.update(request.clone())?;
        let mut pending = self.pending.lock();
        match placement {
            Placement::Forefront => pending.push_front(unique_key.to_string()),
            Placement::Tail => pending.push_back(unique_key.to_string()),
        }
        drop(pending);
        self.touch();
        self.notify.notify_one();
        Ok(request)
    }

    /// Applies an in-place mutation to a request's persisted record without
    /// touching its lease or lifecycle state — used to write back
    /// [`crate::crawler::RequestContext`] mutations (`loaded_url`, header
    /// overrides) once a request's handler invocation has settled.
    pub fn mutate_request(&self, unique_key: &str, f: impl FnOnce(&mut Request)) -> Result<(), QueueError> {
        let Some(mut request) = self.storage.get(unique_key) else {
            return Ok(());
        };
        f(&mut request);
        self.storage.update(request)
    }

    pub fn len_pending(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn len_in_progress(&self) -> usize {
        self.in_progress.len()
    }

    pub fn handled_count(&self) -> u64 {
        self.handled_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len_pending() == 0 && self.len_in_progress() == 0
    }

    /// True once the queue has had nothing pending or in progress for at
    /// least `forward_progress_window` — guards against declaring the crawl
    /// finished while a storage client is still catching up on writes that
    /// will add more requests momentarily.
    pub fn is_finished(&self) -> bool {
        self.is_empty() && self.last_mutation.lock().elapsed() >= self.forward_progress_window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorageClient;

    fn queue() -> RequestQueue {
        RequestQueue::new(
            Arc::new(MemoryStorageClient::new()),
            Duration::from_millis(50),
            Duration::from_millis(10),
        )
    }

    #[test]
    fn duplicate_requests_are_deduplicated() {
        let q = queue();
        let req = Request::new("https://example.com", false).unwrap();
        assert!(q.add_request(req.clone()).unwrap());
        assert!(!q.add_request(req).unwrap());
        assert_eq!(q.len_pending(), 1);
    }

    #[test]
    fn forefront_requests_are_leased_before_tail_requests() {
        let q = queue();
        q.add_request(Request::new("https://example.com/a", false).unwrap())
            .unwrap();
        let mut forefront = Request::new("https://example.com/b", false).unwrap();
        forefront.placement = Placement::Forefront;
        q.add_request(forefront).unwrap();

        let next = q.fetch_next_request().unwrap();
        assert_eq!(next.url, "https://example.com/b");
    }

    #[test]
    fn lease_then_handle_removes_from_in_progress() {
        let q = queue();
        q.add_request(Request::new("https://example.com", false).unwrap())
            .unwrap();
        let leased = q.fetch_next_request().unwrap();
        assert_eq!(q.len_in_progress(), 1);
        q.mark_request_handled(&leased.unique_key).unwrap();
        assert_eq!(q.len_in_progress(), 0);
        assert_eq!(q.handled_count(), 1);
    }

    #[test]
    fn reclaim_requeues_until_max_retries_then_errors() {
        let q = queue();
        let mut req = Request::new("https://example.com", false).unwrap();
        req.max_retries = Some(1);
        q.add_request(req).unwrap();

        let leased = q.fetch_next_request().unwrap();
        let retried = q.reclaim_request(&leased.unique_key, Placement::Tail, None).unwrap();
        assert_eq!(retried.state, RequestState::Retrying);

        let leased_again = q.fetch_next_request().unwrap();
        let errored = q
            .reclaim_request(&leased_again.unique_key, Placement::Tail, None)
            .unwrap();
        assert_eq!(errored.state, RequestState::Errored);
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn is_finished_waits_out_the_forward_progress_window() {
        let q = queue();
        assert!(q.is_empty());
        // freshly constructed, last_mutation is "now" so is_finished is false
        assert!(!q.is_finished());
        tokio::time::sleep(Duration::from_millis(15)).await;
        assert!(q.is_finished());
    }

    #[test]
    fn no_retry_request_errors_on_first_failure_regardless_of_max_retries() {
        let q = queue();
        let req = Request::new("https://example.com", false).unwrap().with_no_retry(true);
        q.add_request(req).unwrap();

        let leased = q.fetch_next_request().unwrap();
        let errored = q
            .reclaim_request(&leased.unique_key, Placement::Tail, Some("blocked"))
            .unwrap();
        assert_eq!(errored.state, RequestState::Errored);
        assert_eq!(errored.error_messages, vec!["blocked".to_string()]);
    }

    #[test]
    fn mutate_request_writes_back_loaded_url() {
        let q = queue();
        q.add_request(Request::new("https://example.com", false).unwrap())
            .unwrap();
        let leased = q.fetch_next_request().unwrap();
        q.mutate_request(&leased.unique_key, |r| {
            r.loaded_url = Some("https://example.com/after-redirect".to_string());
        })
        .unwrap();
        q.mark_request_handled(&leased.unique_key).unwrap();
        assert_eq!(
            q.storage.get(&leased.unique_key).unwrap().loaded_url.as_deref(),
            Some("https://example.com/after-redirect")
        );
    }
}
