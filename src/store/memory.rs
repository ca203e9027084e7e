// In-memory blob store - backs tests and offline sessions

use super::{BlobStore, StoreError};
use std::collections::HashMap;
use std::sync::Mutex;

/// A [`BlobStore`] backed by a `HashMap`.
///
/// Signed URLs are synthesized as `memory://<key>`; fetching accepts
/// only URLs this store handed out.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store bytes under a key, replacing any previous object
    pub fn insert(&self, key: &str, bytes: Vec<u8>) {
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
    }

    /// Remove an object; returns whether it existed
    pub fn remove(&self, key: &str) -> bool {
        self.objects.lock().unwrap().remove(key).is_some()
    }
}

impl BlobStore for MemoryBlobStore {
    fn resolve_signed_url(&self, storage_key: &str) -> Result<String, StoreError> {
        let objects = self.objects.lock().unwrap();
        if objects.contains_key(storage_key) {
            Ok(format!("memory://{storage_key}"))
        } else {
            Err(StoreError::NotFound(storage_key.to_string()))
        }
    }

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, StoreError> {
        let key = url
            .strip_prefix("memory://")
            .ok_or_else(|| StoreError::Fetch(format!("not a memory URL: {url}")))?;

        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}
