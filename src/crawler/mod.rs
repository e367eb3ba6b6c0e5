//! Crawler Runtime (spec.md component I, spec.md §4.7).
//!
//! Drives the per-request lifecycle
//! `LEASED → PRE_NAV_HOOKS → NAVIGATED → HANDLER → POST_HOOKS → (HANDLED | ERRORED)`
//! on top of the [`crate::autoscaled_pool::AutoscaledPool`], the way the
//! teacher's `orchestrator::crawl_pages` drives `process_single_page` —
//! generalized from a hardcoded browser-automation pipeline to a
//! user-supplied [`RequestHandler`], since HTTP transport and browser
//! automation are external collaborators here (spec.md §6), not part of
//! this crate.

pub mod circuit_breaker;
mod context;
pub mod failure;
pub mod retry;

pub use context::RequestContext;
pub use failure::FailureKind;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::autoscaled_pool::{AutoscaledPool, TaskSource};
use crate::cancellation::CancellationToken;
use crate::config::Configuration;
use crate::error::CrawlerError;
use crate::event_bus::{Event, EventBus};
use crate::external::RequestListSource;
use crate::proxy::ProxyConfiguration;
use crate::queue::RequestQueue;
use crate::request::{Placement, Request};
use crate::session::SessionPool;

use circuit_breaker::{extract_domain, CircuitBreaker};

/// User-supplied handler invoked at the HANDLER step. Returning `Err`
/// drives the request into ERRORED, where [`FailureKind::classify`]
/// decides retry vs. fail.
pub trait RequestHandler: Send + Sync {
    fn handle<'a>(&'a self, ctx: &'a RequestContext) -> BoxFuture<'a, Result<(), anyhow::Error>>;
}

impl<F> RequestHandler for F
where
    F: for<'a> Fn(&'a RequestContext) -> BoxFuture<'a, Result<(), anyhow::Error>> + Send + Sync,
{
    fn handle<'a>(&'a self, ctx: &'a RequestContext) -> BoxFuture<'a, Result<(), anyhow::Error>> {
        self(ctx)
    }
}

/// Invoked once a request exhausts `max_request_retries`, with the request
/// ending DONE (not reclaimed) to avoid infinite loops (spec.md §4.7).
pub trait FailedRequestHandler: Send + Sync {
    fn handle_failed<'a>(&'a self, ctx: &'a RequestContext, error: &'a anyhow::Error) -> BoxFuture<'a, ()>;
}

pub struct Crawler {
    config: Arc<Configuration>,
    queue: Arc<RequestQueue>,
    sessions: Arc<SessionPool>,
    proxy: Option<Arc<ProxyConfiguration>>,
    pool: Arc<AutoscaledPool>,
    events: EventBus,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
    handler: Arc<dyn RequestHandler>,
    failed_handler: Option<Arc<dyn FailedRequestHandler>>,
    max_requests_per_crawl: Option<u64>,
    handled_total: AtomicU64,
    request_handler_timeout: Duration,
}

impl Crawler {
    #[must_use]
    pub fn new(
        config: Arc<Configuration>,
        queue: Arc<RequestQueue>,
        sessions: Arc<SessionPool>,
        pool: Arc<AutoscaledPool>,
        events: EventBus,
        handler: Arc<dyn RequestHandler>,
    ) -> Arc<Self> {
        let circuit_breaker = config.circuit_breaker_enabled().then(|| {
            Arc::new(CircuitBreaker::new(
                config.circuit_breaker_failure_threshold(),
                config.circuit_breaker_success_threshold(),
                config.circuit_breaker_half_open_timeout(),
            ))
        });
        Arc::new(Self {
            queue,
            sessions,
            proxy: None,
            pool,
            events,
            circuit_breaker,
            handler,
            failed_handler: None,
            max_requests_per_crawl: None,
            handled_total: AtomicU64::new(0),
            request_handler_timeout: Duration::from_secs(60),
            config,
        })
    }

    #[must_use]
    pub fn with_proxy(mut self: Arc<Self>, proxy: Arc<ProxyConfiguration>) -> Arc<Self> {
        Arc::get_mut(&mut self).expect("Crawler not yet shared").proxy = Some(proxy);
        self
    }

    #[must_use]
    pub fn with_failed_request_handler(mut self: Arc<Self>, handler: Arc<dyn FailedRequestHandler>) -> Arc<Self> {
        Arc::get_mut(&mut self).expect("Crawler not yet shared").failed_handler = Some(handler);
        self
    }

    #[must_use]
    pub fn with_max_requests_per_crawl(mut self: Arc<Self>, limit: u64) -> Arc<Self> {
        Arc::get_mut(&mut self).expect("Crawler not yet shared").max_requests_per_crawl = Some(limit);
        self
    }

    #[must_use]
    pub fn with_request_handler_timeout(mut self: Arc<Self>, timeout: Duration) -> Arc<Self> {
        Arc::get_mut(&mut self).expect("Crawler not yet shared").request_handler_timeout = timeout;
        self
    }

    /// Drains `source` once at startup, enqueuing each request at the
    /// forefront in source order (spec.md §6 request-list bootstrap
    /// contract): the list is consumed before any dynamically discovered
    /// URL, and source order is preserved among the forefront-inserted
    /// batch by enqueuing in reverse.
    pub async fn bootstrap(&self, source: &dyn RequestListSource) -> Result<usize, CrawlerError> {
        let mut items = source.drain().await;
        items.reverse();
        let mut added = 0;
        for mut request in items {
            request.placement = Placement::Forefront;
            request.max_retries.get_or_insert(self.config.max_request_retries());
            if self.queue.add_request(request)? {
                added += 1;
            }
        }
        Ok(added)
    }

    pub fn handled_total(&self) -> u64 {
        self.handled_total.load(Ordering::Relaxed)
    }

    /// Runs the crawl to completion: delegates to the autoscaled pool with
    /// `is_task_ready = queue.hasMoreRequests`, `is_finished = queue.isFinished`,
    /// and `run_task = process_one_request`, per spec.md §4.7 exit conditions.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<(), CrawlerError> {
        let this = self.clone();
        self.pool
            .clone()
            .run(
                this.clone() as Arc<dyn TaskSource<Request>>,
                move |request: Request| {
                    let this = this.clone();
                    let cancel = cancel.clone();
                    async move {
                        this.process_one_request(request, cancel).await;
                    }
                },
                cancel.clone(),
            )
            .await;
        Ok(())
    }

    async fn process_one_request(self: &Arc<Self>, mut request: Request, cancel: CancellationToken) {
        // Requests enqueued directly via `queue.add_request` (handler-discovered
        // links, not just `bootstrap`'s request-list seed) carry no
        // `max_retries` of their own; stamp the configured default onto both
        // the in-flight copy and the persisted record here so every request
        // that ever reaches `reclaim_request` has a retry ceiling (spec.md
        // §4.7 `maxRequestRetries`, default 3) instead of retrying forever.
        if request.max_retries.is_none() {
            let default_retries = self.config.max_request_retries();
            let _ = self.queue.mutate_request(&request.unique_key, |r| {
                r.max_retries.get_or_insert(default_retries);
            });
            request.max_retries = Some(default_retries);
        }

        if let Some(limit) = self.max_requests_per_crawl {
            if self.handled_total() >= limit {
                let _ = self
                    .queue
                    .reclaim_request(&request.unique_key, Placement::Tail, None);
                return;
            }
        }

        let domain = extract_domain(&request.url).ok();
        if let (Some(cb), Some(domain)) = (&self.circuit_breaker, &domain) {
            if !cb.should_attempt(domain) {
                log::debug!("circuit breaker open for {domain}, reclaiming {}", request.url);
                let _ = self
                    .queue
                    .reclaim_request(&request.unique_key, Placement::Tail, None);
                return;
            }
        }

        let session = Some(self.sessions.get_session());
        let proxy_url = match (&self.proxy, &session) {
            (Some(proxy), Some(session)) => proxy.proxy_url_for(&session.id),
            _ => None,
        };

        let ctx = RequestContext {
            request: request.clone(),
            session: session.clone(),
            proxy_url,
            queue: self.queue.clone(),
            cancel,
            mutations: parking_lot::Mutex::new(Default::default()),
        };

        let outcome = tokio::time::timeout(self.request_handler_timeout, self.handler.handle(&ctx)).await;

        match outcome {
            Ok(Ok(())) => {
                self.on_success(&ctx, domain.as_deref());
            }
            Ok(Err(error)) => {
                self.on_failure(&ctx, error, domain.as_deref()).await;
            }
            Err(_elapsed) => {
                self.on_failure(&ctx, anyhow::anyhow!("navigation timeout"), domain.as_deref())
                    .await;
            }
        }
    }

    /// Writes back the `loaded_url`/header mutations a handler recorded on
    /// `ctx` (spec.md §3's "read/mutate capability bound to the active
    /// lease") onto the queue's persisted record.
    fn apply_mutations(&self, ctx: &RequestContext) {
        let mutations = ctx.mutations.lock();
        if mutations.loaded_url.is_none() && mutations.header_overrides.is_empty() {
            return;
        }
        let loaded_url = mutations.loaded_url.clone();
        let header_overrides = mutations.header_overrides.clone();
        drop(mutations);
        let _ = self.queue.mutate_request(&ctx.request.unique_key, |r| {
            if let Some(url) = loaded_url {
                r.loaded_url = Some(url);
            }
            r.headers.extend(header_overrides);
        });
    }

    fn on_success(self: &Arc<Self>, ctx: &RequestContext, domain: Option<&str>) {
        if let Some(session) = &ctx.session {
            session.mark_good();
        }
        if let (Some(proxy), Some(session)) = (&self.proxy, &ctx.session) {
            proxy.record_success(&session.id);
        }
        if let (Some(cb), Some(domain)) = (&self.circuit_breaker, domain) {
            cb.record_success(domain);
        }
        self.apply_mutations(ctx);
        if self.queue.mark_request_handled(&ctx.request.unique_key).is_ok() {
            self.handled_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    async fn on_failure(self: &Arc<Self>, ctx: &RequestContext, error: anyhow::Error, domain: Option<&str>) {
        let kind = FailureKind::classify(&error);

        if kind.blames_session() {
            if let Some(session) = &ctx.session {
                if kind.retires_session() {
                    session.retire();
                } else {
                    session.mark_bad();
                }
            }
        }
        if kind == FailureKind::Blocked {
            if let (Some(proxy), Some(session)) = (&self.proxy, &ctx.session) {
                proxy.record_blocked(&session.id);
            }
        }
        if let (Some(cb), Some(domain)) = (&self.circuit_breaker, domain) {
            cb.record_failure(domain, &error.to_string());
        }

        if !kind.is_retryable() || ctx.request.no_retry {
            self.fail_permanently(ctx, &error).await;
            return;
        }

        match self
            .queue
            .reclaim_request(&ctx.request.unique_key, Placement::Tail, Some(&error.to_string()))
        {
            Ok(reclaimed) if reclaimed.state == crate::request::RequestState::Errored => {
                self.fail_permanently(ctx, &error).await;
            }
            Ok(_) => {
                let delay = retry::backoff_for(ctx.request.retry_count + 1, kind, &self.config);
                log::warn!(
                    "request failed (kind={kind:?}), retrying {} after {delay:?}",
                    ctx.request.url
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                log::error!("failed to reclaim request {}: {err}", ctx.request.url);
            }
        }
    }

    async fn fail_permanently(self: &Arc<Self>, ctx: &RequestContext, error: &anyhow::Error) {
        self.apply_mutations(ctx);
        if let Some(handler) = &self.failed_handler {
            handler.handle_failed(ctx, error).await;
        }
        let _ = self
            .queue
            .mark_request_failed(&ctx.request.unique_key, &error.to_string());
        let _ = self.events.publish_with_backpressure(Event::persist_state()).await;
    }
}

impl TaskSource<Request> for Crawler {
    fn next_task(&self) -> BoxFuture<'_, Option<Request>> {
        Box::pin(async move { self.queue.fetch_next_request_wait(Duration::from_millis(200)).await })
    }
}
