// Command types - everything the surrounding UI can ask the engine to do
// One command per user gesture; effect-knob drags collapse into a
// single partial-params update instead of a callback per field

use crate::sampler::SamplePath;
use crate::sequencer::StepCount;
use crate::track::{EffectParamsUpdate, TrackId, TrackType};

#[derive(Debug, Clone)]
pub enum Command {
    /// Toggle transport: starts when stopped, stops when playing
    PlayToggle,
    Stop,
    SetTempo(u16),
    SetSwing(f32),
    SetStepCount(StepCount),
    AddTrack { track_type: TrackType, name: String },
    RemoveTrack(TrackId),
    /// Assign a drum sample and start loading it
    SetSample { track_id: TrackId, path: SamplePath },
    /// Re-run the bounded loader from attempt 1 after a failure
    RetryLoad(TrackId),
    /// Flip a pattern cell; `degree` is None for drum grids
    ToggleCell {
        track_id: TrackId,
        step: usize,
        degree: Option<usize>,
    },
    SetMuted { track_id: TrackId, muted: bool },
    SetSoloed { track_id: TrackId, soloed: bool },
    SetGated { track_id: TrackId, gated: bool },
    SetVolume { track_id: TrackId, db: f32 },
    SetPan { track_id: TrackId, pan: f32 },
    UpdateEffectParams {
        track_id: TrackId,
        update: EffectParamsUpdate,
    },
}
