//! External collaborator capability traits (spec.md §6). These describe
//! contracts the crawler runtime depends on but does not implement — HTTP
//! transport, browser automation, and request-list bootstrapping are all
//! explicit non-goals of this crate. Grounded on the shape of the teacher's
//! own external seams: `launch_browser` (a capability the orchestrator
//! calls through, not owns) and the `VecDeque` queue-seeding in
//! `orchestrator::crawl_pages`.

use std::collections::HashMap;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::request::Request;
use crate::session::cookie::Cookie;

#[derive(Debug, Clone)]
pub struct HttpRequestSpec {
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub proxy_url: Option<String>,
    pub session_cookies: Vec<Cookie>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub redirect_urls: Vec<String>,
    pub final_url: String,
}

/// HTTP transport capability (spec.md §6). Must honor `spec.proxy_url` and
/// `spec.session_cookies`, and cooperate with [`crate::cancellation::CancellationToken`].
pub trait HttpClient: Send + Sync {
    fn send_request<'a>(
        &'a self,
        spec: HttpRequestSpec,
        cancel: &'a crate::cancellation::CancellationToken,
    ) -> BoxFuture<'a, Result<HttpResponse, anyhow::Error>>;
}

/// Browser automation capability (spec.md §6). Implementations must isolate
/// cookies per session (incognito context or equivalent) when the crawler
/// requests per-request isolation.
pub trait BrowserController: Send + Sync {
    type Page: Send;

    fn new_page(&self, proxy_url: Option<String>) -> BoxFuture<'_, Result<Self::Page, anyhow::Error>>;
    fn set_cookies<'a>(&'a self, page: &'a Self::Page, cookies: &'a [Cookie]) -> BoxFuture<'a, Result<(), anyhow::Error>>;
    fn get_cookies<'a>(&'a self, page: &'a Self::Page) -> BoxFuture<'a, Result<Vec<Cookie>, anyhow::Error>>;
    fn goto<'a>(&'a self, page: &'a Self::Page, url: &'a str, timeout: Duration) -> BoxFuture<'a, Result<(), anyhow::Error>>;
    fn close(&self, page: Self::Page) -> BoxFuture<'_, Result<(), anyhow::Error>>;
}

/// A read-only ordered source of bootstrap URLs, drained once at crawler
/// start with each request enqueued at the forefront in source order
/// (spec.md §6).
pub trait RequestListSource: Send + Sync {
    fn drain(&self) -> BoxFuture<'_, Vec<Request>>;
}

/// In-memory [`RequestListSource`], for tests and simple seed lists.
pub struct VecRequestListSource {
    items: Mutex<Vec<Request>>,
}

impl VecRequestListSource {
    #[must_use]
    pub fn new(items: Vec<Request>) -> Self {
        Self { items: Mutex::new(items) }
    }
}

impl RequestListSource for VecRequestListSource {
    fn drain(&self) -> BoxFuture<'_, Vec<Request>> {
        Box::pin(async move { std::mem::take(&mut *self.items.lock()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn vec_source_drains_exactly_once() {
        let source = VecRequestListSource::new(vec![
            Request::new("https://example.com/a", false).unwrap(),
            Request::new("https://example.com/b", false).unwrap(),
        ]);
        let first = source.drain().await;
        assert_eq!(first.len(), 2);
        let second = source.drain().await;
        assert!(second.is_empty());
    }
}
