//! Broadcast event bus carrying the five named runtime events
//! (`persistState`, `systemInfo`, `migrating`, `aborting`, `exit`) to any
//! number of subscribers, with configurable backpressure behavior.

mod bus;
pub mod config;
pub mod emitters;
pub mod metrics;
pub mod streaming;
pub mod types;

pub use bus::EventBus;
pub use config::EventBusConfig;
pub use emitters::spawn_standard_emitters;
pub use metrics::{EventBusMetrics, MetricsSnapshot};
pub use streaming::FilteredReceiver;
pub use types::{BatchPublishResult, Event, ShutdownReason};
