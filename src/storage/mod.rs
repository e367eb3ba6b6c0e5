//! Storage Client API (spec component B).
//!
//! A small async trait describing the durable backing store a
//! [`crate::queue::RequestQueue`] commits to. Mirrors the claim/ack/nack
//! shape of `Devolutions-devolutions-gateway`'s `job-queue` crate
//! (`JobQueue`/`JobReader`), generalized from "jobs" to "requests" and from
//! a single reader to the queue's own leasing logic sitting in front of it.

mod memory;

pub use memory::MemoryStorageClient;

use crate::error::QueueError;
use crate::request::Request;

/// A durable (or in-memory, for tests) backing store for request records.
///
/// Implementors are not required to perform deduplication or leasing
/// themselves — [`crate::queue::RequestQueue`] is responsible for both and
/// treats the storage client as a plain key-value record store keyed by
/// `unique_key`.
pub trait StorageClient: Send + Sync {
    /// Inserts a request record, or returns `Ok(false)` without overwriting
    /// if a record with the same `unique_key` already exists.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Storage`] on a backend failure.
    fn put_if_absent(&self, request: Request) -> Result<bool, QueueError>;

    /// Overwrites an existing record (e.g. to persist a new `state`).
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Storage`] on a backend failure.
    fn update(&self, request: Request) -> Result<(), QueueError>;

    fn get(&self, unique_key: &str) -> Option<Request>;

    /// Removes a record permanently (handled requests only).
    fn remove(&self, unique_key: &str);

    /// Number of records currently stored, regardless of state.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All records, in insertion order, for recovery/bootstrap.
    fn all(&self) -> Vec<Request>;
}
