//! Crate-wide error taxonomy.
//!
//! Leaf errors are `thiserror` enums scoped to the module that raises them;
//! orchestration-level code (the crawler runtime, the autoscaled pool's task
//! results) collapses these into `anyhow::Error` the way the teacher crate's
//! `crawl_engine` layer does.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("request queue storage backend failed: {0}")]
    Storage(String),
    #[error("request {0} is not currently leased")]
    NotLeased(String),
    #[error("request {0} was already handled")]
    AlreadyHandled(String),
    #[error("queue is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum SessionPoolError {
    #[error("session {0} not found")]
    NotFound(String),
    #[error("session pool has been shut down")]
    ShutDown,
}

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("no proxy tiers configured")]
    NoTiers,
    #[error("proxy tier index {0} out of range (have {1} tiers)")]
    TierOutOfRange(usize, usize),
}

#[derive(Debug, Error)]
pub enum EventBusError {
    #[error("failed to publish event: {0}")]
    PublishFailed(String),
    #[error("no active subscribers")]
    NoSubscribers,
    #[error("receiver lagged behind, missed {0} messages")]
    ReceiverLagged(u64),
    #[error("event bus shutdown")]
    Shutdown,
    #[error("event channel is full (capacity exceeded)")]
    ChannelFull,
    #[error("drain timeout: {pending_operations} operations still pending")]
    DrainTimeout { pending_operations: usize },
    #[error("publish timed out waiting for channel capacity")]
    PublishTimeout,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be >= {minimum}, got {actual}")]
    OutOfRange {
        field: &'static str,
        minimum: i64,
        actual: i64,
    },
    #[error("max_concurrency ({max}) must be >= min_concurrency ({min})")]
    ConcurrencyRange { min: usize, max: usize },
    #[error("{0} cannot be empty")]
    Empty(&'static str),
}

#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
    #[error("session pool error: {0}")]
    SessionPool(#[from] SessionPoolError),
    #[error("request handler failed: {0}")]
    Handler(#[source] anyhow::Error),
    #[error("navigation failed: {0}")]
    Navigation(#[source] anyhow::Error),
    #[error("crawler was cancelled")]
    Cancelled,
}
