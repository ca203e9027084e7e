// Blob store seam - signed-URL resolution and byte fetch
// Persistence backends (hosted object storage) implement this trait

pub mod memory;

pub use memory::MemoryBlobStore;

use thiserror::Error;

/// Storage error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage key not found: {0}")]
    NotFound(String),

    #[error("signed URL resolution failed: {0}")]
    SignedUrl(String),

    #[error("fetch failed: {0}")]
    Fetch(String),
}

/// Object-storage collaborator.
///
/// Drum samples recorded by the user live behind opaque storage keys;
/// the loader resolves a key to a time-limited signed URL (roughly one
/// hour of validity) and then fetches the bytes. Both steps can fail
/// transiently and are wrapped in the loader's retry policy.
pub trait BlobStore: Send + Sync {
    /// Resolve an opaque storage key to a time-limited URL
    fn resolve_signed_url(&self, storage_key: &str) -> Result<String, StoreError>;

    /// Fetch the bytes behind a previously-resolved URL
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, StoreError>;
}
