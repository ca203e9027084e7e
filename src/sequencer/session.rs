// Session persistence - JSON snapshots of the whole arrangement.
// Node handles and load states are runtime-only; a restored session
// rebuilds its graph from scratch and re-queues every assigned sample.

use crate::sampler::SamplePath;
use crate::sequencer::StepCount;
use crate::sequencer::engine::Sequencer;
use crate::theory::{Chord, Scale};
use crate::track::{
    DrumPattern, EffectParams, LoadState, RowPattern, Track, TrackId, TrackKind,
};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Session persistence error types
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session format error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Kind-specific pattern payload as persisted.
///
/// Drum load state is deliberately absent: it is reconstructed by
/// re-running the loader on restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KindSnapshot {
    Drum {
        pattern: DrumPattern,
        sample_path: Option<SamplePath>,
        gated: bool,
    },
    Bass {
        pattern: RowPattern,
    },
    Poly {
        pattern: RowPattern,
    },
}

/// One track as persisted; ids survive the round trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub id: TrackId,
    pub name: String,
    pub kind: KindSnapshot,
    pub volume_db: f32,
    pub pan: f32,
    pub effects: EffectParams,
    pub muted: bool,
    pub soloed: bool,
}

impl TrackSnapshot {
    fn from_track(track: &Track) -> Self {
        let kind = match &track.kind {
            TrackKind::Drum {
                pattern,
                sample_path,
                gated,
                ..
            } => KindSnapshot::Drum {
                pattern: pattern.clone(),
                sample_path: sample_path.clone(),
                gated: *gated,
            },
            TrackKind::Bass { pattern } => KindSnapshot::Bass {
                pattern: pattern.clone(),
            },
            TrackKind::Poly { pattern } => KindSnapshot::Poly {
                pattern: pattern.clone(),
            },
        };
        Self {
            id: track.id,
            name: track.name.clone(),
            kind,
            volume_db: track.volume_db,
            pan: track.pan,
            effects: track.effects,
            muted: track.muted,
            soloed: track.soloed,
        }
    }

    fn into_track(self) -> Track {
        let kind = match self.kind {
            KindSnapshot::Drum {
                pattern,
                sample_path,
                gated,
            } => TrackKind::Drum {
                pattern,
                sample_path,
                gated,
                load_state: LoadState::Idle,
            },
            KindSnapshot::Bass { pattern } => TrackKind::Bass { pattern },
            KindSnapshot::Poly { pattern } => TrackKind::Poly { pattern },
        };
        Track {
            id: self.id,
            name: self.name,
            kind,
            volume_db: self.volume_db,
            pan: self.pan,
            effects: self.effects,
            muted: self.muted,
            soloed: self.soloed,
        }
    }
}

/// A complete saved session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub name: String,
    pub saved_at: DateTime<Utc>,
    pub bpm: u16,
    pub swing: f32,
    pub step_count: StepCount,
    pub scale: Scale,
    pub progression: Vec<Chord>,
    pub tracks: Vec<TrackSnapshot>,
}

impl SessionSnapshot {
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        info!("session \"{}\" saved to {}", self.name, path.as_ref().display());
        Ok(())
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

impl Sequencer {
    /// Capture the arrangement as a point-in-time snapshot
    pub fn snapshot(&self, name: impl Into<String>) -> SessionSnapshot {
        let name = name.into();
        self.snapshot_state(|state| {
            let (bpm, swing, step_count, scale, progression, tracks) = state.session_fields();
            SessionSnapshot {
                name,
                saved_at: Utc::now(),
                bpm,
                swing,
                step_count,
                scale: scale.clone(),
                progression: progression.to_vec(),
                tracks: tracks.iter().map(TrackSnapshot::from_track).collect(),
            }
        })
    }

    /// Replace the current arrangement with a saved one.
    ///
    /// Stops the transport, disposes every existing node, rebuilds the
    /// tracks (ids preserved) and queues a fresh load for each drum
    /// track with a sample assigned.
    pub fn restore(&mut self, snapshot: SessionSnapshot) {
        self.stop();
        info!(
            "restoring session \"{}\" ({} tracks)",
            snapshot.name,
            snapshot.tracks.len()
        );

        let mut pending: Vec<(TrackId, SamplePath)> = Vec::new();
        self.restore_state(|state| {
            state.reset_session(
                snapshot.bpm,
                snapshot.swing,
                snapshot.step_count,
                snapshot.scale,
                snapshot.progression,
            );
            for track_snapshot in snapshot.tracks {
                let track = track_snapshot.into_track();
                if let TrackKind::Drum {
                    sample_path: Some(path),
                    ..
                } = &track.kind
                {
                    pending.push((track.id, path.clone()));
                }
                state.restore_track(track);
            }
        });

        self.sync_clock();
        for (id, path) in pending {
            self.queue_load(id, path);
        }
    }
}
