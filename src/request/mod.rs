//! Request & fingerprint (spec component A).
//!
//! A `Request` is the unit of work flowing through the queue. Its
//! `unique_key` is how the queue deduplicates: two requests with the same
//! `unique_key` are the same logical request no matter how many times they
//! are enqueued.

mod unique_key;

pub use unique_key::unique_key_for;

use std::collections::HashMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::imurl::ImUrl;

/// Where in the queue a request should land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placement {
    /// Appended to the back of the queue (default).
    Tail,
    /// Jumped to the front — used for same-site follow-up links that should
    /// be crawled before unrelated already-queued requests.
    Forefront,
}

impl Default for Placement {
    fn default() -> Self {
        Placement::Tail
    }
}

/// Lifecycle state of a request as tracked by the queue and crawler runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestState {
    /// Queued, not yet leased to any worker.
    Pending,
    /// Leased to a worker; `leased_at` records when.
    Leased,
    /// Handler ran to completion without error.
    Handled,
    /// Handler raised an error that is still retryable; back in `Pending`
    /// once the backoff delay elapses.
    Retrying,
    /// Exhausted all retries, or raised a non-retryable error.
    Errored,
}

/// Upper bound on how many entries [`Request::error_messages`] retains;
/// older entries are dropped to keep the record a bounded size (spec.md §3).
const MAX_ERROR_MESSAGES: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Opaque id assigned at enqueue time, distinct from `unique_key` (the
    /// dedup identity) — spec.md §3.
    pub id: String,
    pub unique_key: String,
    pub url: String,
    /// Final URL after redirects; `None` until the request has navigated.
    pub loaded_url: Option<String>,
    pub method: String,
    pub headers: HashMap<String, String>,
    /// Request body, if any. Factors into `unique_key` derivation alongside
    /// `method` and the normalized `url` (spec.md §3).
    pub payload: Option<Vec<u8>>,
    pub user_data: serde_json::Value,
    pub retry_count: u32,
    pub max_retries: Option<u32>,
    /// Bounded log of error messages from prior failed attempts.
    pub error_messages: Vec<String>,
    /// When `true`, any error fails the request immediately regardless of
    /// retryability or `max_retries` (spec.md §4.7, §8).
    pub no_retry: bool,
    pub placement: Placement,
    pub state: RequestState,
    /// Which proxy tier (if any) this request is pinned to, e.g. because a
    /// prior attempt escalated it.
    pub proxy_tier: Option<usize>,
    pub enqueued_at: SystemTime,
    pub leased_at: Option<SystemTime>,
    /// Set once the request reaches a terminal (HANDLED or ERRORED) state.
    pub handled_at: Option<SystemTime>,
}

impl Request {
    /// Builds a request from a URL, deriving `unique_key` from
    /// `method|url|payload` after normalizing the URL and stripping its
    /// fragment (unless `keep_url_fragment` is set).
    ///
    /// # Errors
    ///
    /// Returns an error if `url` fails to parse.
    pub fn new(url: &str, keep_url_fragment: bool) -> anyhow::Result<Self> {
        Self::with_method_and_payload(url, keep_url_fragment, "GET", None)
    }

    /// Builds a request with an explicit method and optional payload, both
    /// of which feed the `unique_key` derivation (spec.md §3).
    ///
    /// # Errors
    ///
    /// Returns an error if `url` fails to parse.
    pub fn with_method_and_payload(
        url: &str,
        keep_url_fragment: bool,
        method: &str,
        payload: Option<Vec<u8>>,
    ) -> anyhow::Result<Self> {
        let parsed = ImUrl::parse(url)?;
        let normalized = if keep_url_fragment {
            parsed.clone()
        } else {
            parsed.without_fragment()?
        };
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            unique_key: unique_key_for(method, normalized.as_str(), payload.as_deref()),
            url: parsed.as_str().to_string(),
            loaded_url: None,
            method: method.to_string(),
            headers: HashMap::new(),
            payload,
            user_data: serde_json::Value::Null,
            retry_count: 0,
            max_retries: None,
            error_messages: Vec::new(),
            no_retry: false,
            placement: Placement::Tail,
            state: RequestState::Pending,
            proxy_tier: None,
            enqueued_at: SystemTime::now(),
            leased_at: None,
            handled_at: None,
        })
    }

    #[must_use]
    pub fn with_unique_key(mut self, unique_key: impl Into<String>) -> Self {
        self.unique_key = unique_key.into();
        self
    }

    #[must_use]
    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    #[must_use]
    pub fn with_user_data(mut self, user_data: serde_json::Value) -> Self {
        self.user_data = user_data;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    #[must_use]
    pub fn with_no_retry(mut self, no_retry: bool) -> Self {
        self.no_retry = no_retry;
        self
    }

    pub fn is_forefront(&self) -> bool {
        matches!(self.placement, Placement::Forefront)
    }

    /// Appends an error message, dropping the oldest entry once
    /// `MAX_ERROR_MESSAGES` is exceeded.
    pub fn push_error_message(&mut self, message: impl Into<String>) {
        if self.error_messages.len() >= MAX_ERROR_MESSAGES {
            self.error_messages.remove(0);
        }
        self.error_messages.push(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_is_stripped_from_unique_key_by_default() {
        let a = Request::new("https://example.com/page#section1", false).unwrap();
        let b = Request::new("https://example.com/page#section2", false).unwrap();
        assert_eq!(a.unique_key, b.unique_key);
    }

    #[test]
    fn fragment_is_kept_when_requested() {
        let a = Request::new("https://example.com/page#section1", true).unwrap();
        let b = Request::new("https://example.com/page#section2", true).unwrap();
        assert_ne!(a.unique_key, b.unique_key);
    }

    #[test]
    fn distinct_urls_get_distinct_keys() {
        let a = Request::new("https://example.com/a", false).unwrap();
        let b = Request::new("https://example.com/b", false).unwrap();
        assert_ne!(a.unique_key, b.unique_key);
    }
}
