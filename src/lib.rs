//! `crawlee_core` — a standalone runtime core for building request-driven
//! web crawlers: a deduplicating request queue, a session pool for
//! identity rotation, tiered proxy configuration with failure-driven
//! escalation, a system-load sampler feeding an autoscaled concurrency
//! pool, a best-effort event bus, and the per-request lifecycle that ties
//! them together.
//!
//! HTTP transport, browser automation, DOM/HTML parsing and link
//! discovery, and CLI scaffolding are out of scope — see [`external`] for
//! the capability traits a host application implements to supply them.

pub mod autoscaled_pool;
pub mod cancellation;
pub mod config;
pub mod crawler;
pub mod error;
pub mod event_bus;
pub mod external;
pub mod imurl;
pub mod proxy;
pub mod queue;
pub mod request;
pub mod session;
pub mod storage;
pub mod system_info;

pub use autoscaled_pool::{AutoscaledPool, TaskSource};
pub use cancellation::CancellationToken;
pub use config::{BackpressureMode, Configuration, ConfigurationBuilder};
pub use crawler::{Crawler, FailedRequestHandler, RequestContext, RequestHandler};
pub use error::{ConfigError, CrawlerError, EventBusError, ProxyError, QueueError, SessionPoolError};
pub use event_bus::{Event, EventBus, EventBusConfig};
pub use imurl::ImUrl;
pub use proxy::{ProxyConfiguration, ProxyTier};
pub use queue::RequestQueue;
pub use request::{Placement, Request, RequestState};
pub use session::{Session, SessionPool};
pub use storage::{MemoryStorageClient, StorageClient};
pub use system_info::{SystemInfoSample, SystemStatus};
