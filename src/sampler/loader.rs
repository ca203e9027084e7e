// Sample loading - resolve, fetch, decode, with bounded retry
// Static assets come from disk; user recordings come from the blob
// store behind a signed URL. Either way the result is f32 PCM.

use crate::sampler::retry::{RetryPolicy, with_retry};
use crate::store::{BlobStore, StoreError};
use crate::track::{LoadState, TrackId};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::time::Duration;
use thiserror::Error;

/// Where a drum track's audio comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplePath {
    /// A bundled static asset on disk
    Asset(PathBuf),
    /// An opaque storage key, resolved through the blob store
    Stored(String),
}

impl SamplePath {
    /// Human-readable name used for the decoded sample
    pub fn display_name(&self) -> String {
        match self {
            SamplePath::Asset(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            SamplePath::Stored(key) => key.clone(),
        }
    }
}

impl fmt::Display for SamplePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplePath::Asset(path) => write!(f, "asset:{}", path.display()),
            SamplePath::Stored(key) => write!(f, "stored:{key}"),
        }
    }
}

/// Decoded interleaved PCM ready to hand to a sample-player node
#[derive(Debug, Clone)]
pub struct DecodedSample {
    pub name: String,
    pub frames: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl DecodedSample {
    pub fn duration_seconds(&self) -> f64 {
        if self.channels == 0 || self.sample_rate == 0 {
            return 0.0;
        }
        self.frames.len() as f64 / self.channels as f64 / self.sample_rate as f64
    }
}

/// Sample loading error types
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV decode error: {0}")]
    Wav(#[from] hound::Error),

    #[error("FLAC decode error: {0}")]
    Flac(#[from] claxon::Error),

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),
}

/// Decode WAV or FLAC bytes, sniffed by magic number
pub fn decode_bytes(name: &str, bytes: &[u8]) -> Result<DecodedSample, LoadError> {
    match bytes.get(..4) {
        Some(b"RIFF") => decode_wav(name, bytes),
        Some(b"fLaC") => decode_flac(name, bytes),
        _ => Err(LoadError::UnsupportedFormat(name.to_string())),
    }
}

fn decode_wav(name: &str, bytes: &[u8]) -> Result<DecodedSample, LoadError> {
    let reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let frames: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<f32>, hound::Error>>()?,
        hound::SampleFormat::Int => {
            let scale = (1u32 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<f32>, hound::Error>>()?
        }
    };

    Ok(DecodedSample {
        name: name.to_string(),
        frames,
        channels: spec.channels,
        sample_rate: spec.sample_rate,
    })
}

fn decode_flac(name: &str, bytes: &[u8]) -> Result<DecodedSample, LoadError> {
    let mut reader = claxon::FlacReader::new(Cursor::new(bytes))?;
    let info = reader.streaminfo();
    let scale = (1u32 << (info.bits_per_sample - 1)) as f32;

    let frames: Vec<f32> = reader
        .samples()
        .map(|s| s.map(|v| v as f32 / scale))
        .collect::<Result<Vec<f32>, claxon::Error>>()?;

    Ok(DecodedSample {
        name: name.to_string(),
        frames,
        channels: info.channels as u16,
        sample_rate: info.sample_rate,
    })
}

/// Load progress reported from a loader thread back to the engine
#[derive(Debug)]
pub enum LoadEvent {
    /// The track's load state changed (Loading/Retrying/Failed)
    State { track_id: TrackId, state: LoadState },
    /// Decode finished; the engine wires the player and flips to Ready
    Loaded { track_id: TrackId, sample: DecodedSample },
}

/// Resolves a [`SamplePath`] to decoded audio, tolerating transient
/// storage failures via [`RetryPolicy`].
///
/// Loads for different tracks run on independent threads and share
/// nothing mutable; one failing track never blocks another.
pub struct SampleLoader {
    store: Arc<dyn BlobStore>,
    policy: RetryPolicy,
}

impl SampleLoader {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(store: Arc<dyn BlobStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    fn fetch(&self, path: &SamplePath) -> Result<Vec<u8>, LoadError> {
        match path {
            SamplePath::Asset(file) => Ok(std::fs::read(file)?),
            SamplePath::Stored(key) => {
                let url = self.store.resolve_signed_url(key)?;
                Ok(self.store.fetch_bytes(&url)?)
            }
        }
    }

    /// Load synchronously, sleeping through backoff on this thread.
    ///
    /// `on_state` observes every state transition except `Ready`, which
    /// the engine sets once the player node is wired.
    pub fn load(
        &self,
        path: &SamplePath,
        on_state: impl FnMut(LoadState),
    ) -> Result<DecodedSample, LoadError> {
        let mut rng = rand::thread_rng();
        self.load_with(path, &mut rng, std::thread::sleep, on_state)
    }

    /// Load with injected randomness and sleep (deterministic tests)
    pub fn load_with(
        &self,
        path: &SamplePath,
        rng: &mut impl rand::Rng,
        sleep: impl FnMut(Duration),
        mut on_state: impl FnMut(LoadState),
    ) -> Result<DecodedSample, LoadError> {
        on_state(LoadState::Loading(1));

        let result = with_retry(
            &self.policy,
            rng,
            sleep,
            |attempt| {
                warn!("sample {path}: retrying (attempt {attempt})");
                on_state(LoadState::Retrying(attempt));
            },
            |attempt| {
                debug!("sample {path}: fetch attempt {attempt}");
                let bytes = self.fetch(path)?;
                decode_bytes(&path.display_name(), &bytes)
            },
        );

        match result {
            Ok(sample) => {
                debug!(
                    "sample {path}: decoded {:.3}s ({} ch @ {} Hz)",
                    sample.duration_seconds(),
                    sample.channels,
                    sample.sample_rate
                );
                Ok(sample)
            }
            Err(err) => {
                error!("sample {path}: load failed: {err}");
                on_state(LoadState::Failed(err.to_string()));
                Err(err)
            }
        }
    }

    /// Spawn a load on its own thread, reporting progress through `tx`.
    ///
    /// The thread owns its backoff timer; it never blocks the transport
    /// or other tracks' loads. Send failures (receiver gone) just end
    /// the thread quietly.
    pub fn spawn_load(self: &Arc<Self>, track_id: TrackId, path: SamplePath, tx: Sender<LoadEvent>) {
        let loader = Arc::clone(self);
        std::thread::spawn(move || {
            let state_tx = tx.clone();
            let result = loader.load(&path, |state| {
                state_tx.send(LoadEvent::State { track_id, state }).ok();
            });
            if let Ok(sample) = result {
                tx.send(LoadEvent::Loaded { track_id, sample }).ok();
            }
        });
    }
}
