// Track - a named lane: pattern + sound source + effect chain + flags
// Kind-specific payload lives in the TrackKind variant, so a Bass track
// cannot carry a sample path and a Drum track cannot carry degree rows

pub mod bass;
pub mod drum;
pub mod pattern;
pub mod poly;

pub use bass::BassSource;
pub use drum::DrumSource;
pub use pattern::{DEGREES_PER_STEP, DrumPattern, RowPattern};
pub use poly::{PolySource, chord_index};

use crate::sampler::SamplePath;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Gap between a release and the retrigger that follows it, so envelopes
/// restart cleanly instead of gluing two notes together
pub const RETRIGGER_OFFSET_SECONDS: f64 = 0.001;

/// Velocity used for sequencer-triggered synth notes
pub const TRIGGER_VELOCITY: f32 = 0.9;

/// Stable identifier for a track, unique within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(Uuid);

impl TrackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Sample-load lifecycle for drum tracks.
///
/// `Ready` is the only state in which step triggers sound; triggers in
/// any other state are dropped without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading(u32),
    Retrying(u32),
    Failed(String),
    Ready,
}

impl LoadState {
    pub fn is_ready(&self) -> bool {
        matches!(self, LoadState::Ready)
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, LoadState::Loading(_) | LoadState::Retrying(_))
    }
}

/// Per-track effect chain settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectParams {
    /// Filter cutoff in Hz
    pub cutoff_hz: f32,
    /// Filter resonance (Q)
    pub resonance: f32,
    /// Delay send level [0, 1]
    pub delay_send: f32,
    /// Reverb send level [0, 1]
    pub reverb_send: f32,
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            cutoff_hz: 8000.0,
            resonance: 1.0,
            delay_send: 0.0,
            reverb_send: 0.0,
        }
    }
}

/// Partial update applied over current [`EffectParams`]; `None` fields
/// are left untouched. One command carries a whole knob gesture.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EffectParamsUpdate {
    pub cutoff_hz: Option<f32>,
    pub resonance: Option<f32>,
    pub delay_send: Option<f32>,
    pub reverb_send: Option<f32>,
}

impl EffectParams {
    pub fn apply(&mut self, update: EffectParamsUpdate) {
        if let Some(cutoff) = update.cutoff_hz {
            self.cutoff_hz = cutoff.max(10.0);
        }
        if let Some(q) = update.resonance {
            self.resonance = q.max(0.0);
        }
        if let Some(send) = update.delay_send {
            self.delay_send = send.clamp(0.0, 1.0);
        }
        if let Some(send) = update.reverb_send {
            self.reverb_send = send.clamp(0.0, 1.0);
        }
    }
}

/// Track variant discriminant (no payload)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackType {
    Drum,
    Bass,
    Poly,
}

impl fmt::Display for TrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackType::Drum => write!(f, "Drum"),
            TrackType::Bass => write!(f, "Bass"),
            TrackType::Poly => write!(f, "Poly"),
        }
    }
}

/// Kind-specific track payload
#[derive(Debug, Clone, PartialEq)]
pub enum TrackKind {
    Drum {
        pattern: DrumPattern,
        sample_path: Option<SamplePath>,
        /// Truncate hits to exactly one 16th note
        gated: bool,
        load_state: LoadState,
    },
    Bass {
        pattern: RowPattern,
    },
    Poly {
        pattern: RowPattern,
    },
}

impl TrackKind {
    pub fn new(track_type: TrackType, step_count: usize) -> Self {
        match track_type {
            TrackType::Drum => TrackKind::Drum {
                pattern: DrumPattern::new(step_count),
                sample_path: None,
                gated: false,
                load_state: LoadState::Idle,
            },
            TrackType::Bass => TrackKind::Bass {
                pattern: RowPattern::new(step_count),
            },
            TrackType::Poly => TrackKind::Poly {
                pattern: RowPattern::new(step_count),
            },
        }
    }

    pub fn track_type(&self) -> TrackType {
        match self {
            TrackKind::Drum { .. } => TrackType::Drum,
            TrackKind::Bass { .. } => TrackType::Bass,
            TrackKind::Poly { .. } => TrackType::Poly,
        }
    }

    pub fn pattern_len(&self) -> usize {
        match self {
            TrackKind::Drum { pattern, .. } => pattern.len(),
            TrackKind::Bass { pattern } | TrackKind::Poly { pattern } => pattern.len(),
        }
    }

    pub fn resize_pattern(&mut self, step_count: usize) {
        match self {
            TrackKind::Drum { pattern, .. } => pattern.resize(step_count),
            TrackKind::Bass { pattern } | TrackKind::Poly { pattern } => {
                pattern.resize(step_count)
            }
        }
    }
}

/// A sequencer lane
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub kind: TrackKind,
    /// Track gain in dB, [-60, 0]
    pub volume_db: f32,
    /// Stereo position, [-1, 1]
    pub pan: f32,
    pub effects: EffectParams,
    pub muted: bool,
    pub soloed: bool,
}

impl Track {
    pub fn new(track_type: TrackType, name: impl Into<String>, step_count: usize) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            kind: TrackKind::new(track_type, step_count),
            volume_db: -6.0,
            pan: 0.0,
            effects: EffectParams::default(),
            muted: false,
            soloed: false,
        }
    }

    pub fn track_type(&self) -> TrackType {
        self.kind.track_type()
    }

    /// Drum tracks report their load state; synth tracks have none
    pub fn load_state(&self) -> Option<&LoadState> {
        match &self.kind {
            TrackKind::Drum { load_state, .. } => Some(load_state),
            _ => None,
        }
    }

    pub fn set_volume_db(&mut self, db: f32) {
        self.volume_db = db.clamp(-60.0, 0.0);
    }

    pub fn set_pan(&mut self, pan: f32) {
        self.pan = pan.clamp(-1.0, 1.0);
    }
}

/// Convert dB in [-60, 0] to a linear gain multiplier
pub fn db_to_gain(db: f32) -> f64 {
    10.0_f64.powf(db as f64 / 20.0)
}
