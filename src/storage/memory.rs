//! In-memory [`StorageClient`], used by tests and as the default backend
//! when no durable store is configured.

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::QueueError;
use crate::request::Request;

use super::StorageClient;

#[derive(Default)]
pub struct MemoryStorageClient {
    records: DashMap<String, Request>,
    // preserves insertion order for `all()`, since DashMap iteration order
    // is unspecified
    order: Mutex<Vec<String>>,
}

impl MemoryStorageClient {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageClient for MemoryStorageClient {
    fn put_if_absent(&self, request: Request) -> Result<bool, QueueError> {
        let key = request.unique_key.clone();
        let inserted = match self.records.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(request);
                true
            }
        };
        if inserted {
            self.order.lock().push(key);
        }
        Ok(inserted)
    }

    fn update(&self, request: Request) -> Result<(), QueueError> {
        self.records.insert(request.unique_key.clone(), request);
        Ok(())
    }

    fn get(&self, unique_key: &str) -> Option<Request> {
        self.records.get(unique_key).map(|r| r.clone())
    }

    fn remove(&self, unique_key: &str) {
        self.records.remove(unique_key);
        self.order.lock().retain(|k| k != unique_key);
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn all(&self) -> Vec<Request> {
        self.order
            .lock()
            .iter()
            .filter_map(|key| self.records.get(key).map(|r| r.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;

    #[test]
    fn put_if_absent_rejects_duplicate_unique_key() {
        let store = MemoryStorageClient::new();
        let req = Request::new("https://example.com", false).unwrap();
        assert!(store.put_if_absent(req.clone()).unwrap());
        assert!(!store.put_if_absent(req).unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn all_preserves_insertion_order() {
        let store = MemoryStorageClient::new();
        for url in ["https://a.example", "https://b.example", "https://c.example"] {
            store
                .put_if_absent(Request::new(url, false).unwrap())
                .unwrap();
        }
        let urls: Vec<_> = store.all().into_iter().map(|r| r.url).collect();
        assert_eq!(
            urls,
            vec!["https://a.example/", "https://b.example/", "https://c.example/"]
        );
    }
}
