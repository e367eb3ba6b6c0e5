//! Configuration for the crawler runtime.
//!
//! A single explicit `Configuration` record threaded through `Crawler::new`
//! and its collaborators (the queue, the session pool, the autoscaled pool),
//! built through a validating builder — no global mutable state, per the
//! redesign away from a process-wide configuration singleton.

pub mod builder;
pub mod types;

pub use builder::ConfigurationBuilder;
pub use types::{BackpressureMode, Configuration};
