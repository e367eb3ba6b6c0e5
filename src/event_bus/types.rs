//! The five named events a crawler runtime emits (spec.md §4.6), replacing
//! the teacher's open-ended `CrawlEvent` enum (`CrawlStarted`/`PageCrawled`/
//! `LinkRewriteCompleted`/`CrawlCompleted`/`CacheHit`/`Shutdown`) with the
//! fixed taxonomy the spec names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::system_info::SystemInfoSample;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ShutdownReason {
    Completed,
    Error(String),
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Emitted on `event_bus_persist_state_interval` and before a
    /// graceful shutdown; subscribers persist their own state (e.g. the
    /// queue's storage client flushing to disk) in response.
    PersistState { timestamp: DateTime<Utc> },
    /// Emitted on `event_bus_system_info_interval` carrying the latest
    /// [`SystemInfoSample`] — the autoscaled pool's scaler is the primary
    /// subscriber, but any collaborator can observe load this way.
    SystemInfo {
        timestamp: DateTime<Utc>,
        sample: SystemInfoSample,
    },
    /// Emitted when the crawler is about to migrate to a new host/process
    /// (e.g. a rolling deploy) — subscribers should persist and stop
    /// accepting new work.
    Migrating { timestamp: DateTime<Utc> },
    /// Emitted when the process is aborting (signal received, fatal
    /// error) — subscribers have less time to react than on `Migrating`.
    Aborting { timestamp: DateTime<Utc> },
    /// Terminal event, emitted exactly once as the last event before the
    /// bus shuts down.
    Exit {
        timestamp: DateTime<Utc>,
        reason: ShutdownReason,
    },
}

impl Event {
    pub fn persist_state() -> Self {
        Event::PersistState { timestamp: Utc::now() }
    }

    pub fn system_info(sample: SystemInfoSample) -> Self {
        Event::SystemInfo {
            timestamp: Utc::now(),
            sample,
        }
    }

    pub fn migrating() -> Self {
        Event::Migrating { timestamp: Utc::now() }
    }

    pub fn aborting() -> Self {
        Event::Aborting { timestamp: Utc::now() }
    }

    pub fn exit(reason: ShutdownReason) -> Self {
        Event::Exit {
            timestamp: Utc::now(),
            reason,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::PersistState { .. } => "persistState",
            Event::SystemInfo { .. } => "systemInfo",
            Event::Migrating { .. } => "migrating",
            Event::Aborting { .. } => "aborting",
            Event::Exit { .. } => "exit",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchPublishResult {
    pub total: usize,
    pub published: usize,
    pub failed: usize,
    pub max_subscribers: usize,
}

impl BatchPublishResult {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.published as f64 / self.total as f64
    }
}
