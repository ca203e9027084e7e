// Sequencer module - transport clock, playback engine, session snapshots

pub mod clock;
pub mod engine;
pub mod session;

pub use clock::{AtomicF32, MonotonicClock, Tick, TickScheduler, TimeSource, TransportClock};
pub use engine::{EngineError, MAX_BPM, MIN_BPM, Sequencer};
pub use session::{SessionError, SessionSnapshot, TrackSnapshot};

use serde::{Deserialize, Serialize};

/// Global pattern length, restricted to the supported grid sizes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum StepCount {
    Four,
    Eight,
    #[default]
    Sixteen,
    ThirtyTwo,
    SixtyFour,
}

impl StepCount {
    pub const ALL: [StepCount; 5] = [
        StepCount::Four,
        StepCount::Eight,
        StepCount::Sixteen,
        StepCount::ThirtyTwo,
        StepCount::SixtyFour,
    ];

    pub fn as_steps(self) -> usize {
        match self {
            StepCount::Four => 4,
            StepCount::Eight => 8,
            StepCount::Sixteen => 16,
            StepCount::ThirtyTwo => 32,
            StepCount::SixtyFour => 64,
        }
    }
}

impl TryFrom<usize> for StepCount {
    type Error = String;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(StepCount::Four),
            8 => Ok(StepCount::Eight),
            16 => Ok(StepCount::Sixteen),
            32 => Ok(StepCount::ThirtyTwo),
            64 => Ok(StepCount::SixtyFour),
            other => Err(format!("unsupported step count: {other}")),
        }
    }
}

impl From<StepCount> for usize {
    fn from(value: StepCount) -> Self {
        value.as_steps()
    }
}
