pub mod loader;
pub mod retry;

pub use loader::{DecodedSample, LoadError, LoadEvent, SampleLoader, SamplePath, decode_bytes};
pub use retry::{RetryPolicy, with_retry};
