//! Per-request context handed to user hooks and the request handler,
//! carrying the request alongside its leased session and resolved proxy URL
//! (LEASED state of the per-request state machine, spec.md §4.7).
//!
//! spec.md §3 grants the handler a "read/mutate capability bound to the
//! active lease" rather than direct ownership of the `Request` — modeled
//! here as a small mutation buffer the NAVIGATED step (`set_loaded_url`) and
//! PRE_NAV_HOOKS step (`override_header`) write into, applied back onto the
//! queue's record when the request reaches a terminal state.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cancellation::CancellationToken;
use crate::queue::RequestQueue;
use crate::request::Request;
use crate::session::Session;

#[derive(Default)]
pub(crate) struct RequestMutations {
    pub loaded_url: Option<String>,
    pub header_overrides: HashMap<String, String>,
}

pub struct RequestContext {
    pub request: Request,
    pub session: Option<Arc<Session>>,
    pub proxy_url: Option<String>,
    pub queue: Arc<RequestQueue>,
    pub cancel: CancellationToken,
    pub(crate) mutations: Mutex<RequestMutations>,
}

impl RequestContext {
    /// Convenience accessor mirroring hooks that only need the session id
    /// to correlate observations (spec.md end-to-end scenario 4).
    pub fn session_id(&self) -> Option<&str> {
        self.session.as_deref().map(|s| s.id.as_str())
    }

    /// Records the final URL after redirects, applied to the queue record
    /// once the request reaches HANDLED (spec.md §3 `loadedUrl`).
    pub fn set_loaded_url(&self, url: impl Into<String>) {
        self.mutations.lock().loaded_url = Some(url.into());
    }

    /// Overrides (or adds) a request header for this attempt. Mutates the
    /// persisted record like `set_loaded_url`; does not affect the in-flight
    /// `self.request.headers` already captured at LEASED time.
    pub fn override_header(&self, key: impl Into<String>, value: impl Into<String>) {
        self.mutations.lock().header_overrides.insert(key.into(), value.into());
    }
}
