// Notification types - engine state changes surfaced to the UI

use crate::track::{LoadState, TrackId};

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Transport started (true) or stopped (false)
    PlaybackChanged(bool),
    /// The playhead moved to this step
    StepAdvanced(usize),
    /// A drum track's sample load progressed
    LoadStateChanged { track_id: TrackId, state: LoadState },
    TrackAdded(TrackId),
    TrackRemoved(TrackId),
}
