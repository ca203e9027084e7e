// Echo Delirium - Library exports for tests and benchmarks

pub mod effects;
pub mod graph;
pub mod messaging;
pub mod sampler;
pub mod sequencer;
pub mod store;
pub mod theory;
pub mod track;

// Re-export commonly used types for convenience
pub use effects::{EffectChain, delay_time_seconds};
pub use graph::{AudioGraph, CaptureGraph, GraphError, NodeId, NodeKind, Param};
pub use messaging::channels::{create_command_channel, create_notification_channel};
pub use messaging::{Command, Notification};
pub use sampler::{LoadError, SampleLoader, SamplePath};
pub use sequencer::{
    EngineError, Sequencer, SessionSnapshot, StepCount, TickScheduler, TransportClock,
};
pub use store::{BlobStore, MemoryBlobStore, StoreError};
pub use theory::{Chord, ChordQuality, Scale};
pub use track::{
    DrumPattern, EffectParams, EffectParamsUpdate, LoadState, RowPattern, Track, TrackId,
    TrackType,
};
