// Audio graph seam - node-graph primitives live in the host platform
// The sequencer core schedules against this trait; it never owns DSP

pub mod capture;

pub use capture::{CaptureGraph, GraphEvent, GraphTrace};

use thiserror::Error;

/// Opaque handle to a node owned by the graph backend
pub type NodeId = u64;

/// Node types the sequencer core can ask the backend to create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Filter,
    Delay,
    Reverb,
    Gain,
    Panner,
    SamplePlayer,
    MonoSynth,
    PolySynth,
}

/// Ramp-capable numeric parameters exposed by graph nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    /// Filter cutoff in Hz
    FilterCutoff,
    /// Filter resonance (Q)
    FilterQ,
    /// Delay time in seconds
    DelayTime,
    /// Delay wet/send level [0, 1]
    DelayWet,
    /// Reverb wet/send level [0, 1]
    ReverbWet,
    /// Linear gain multiplier
    Gain,
    /// Stereo pan [-1, 1]
    Pan,
}

/// Graph backend error types
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("audio context unavailable: {0}")]
    Unavailable(String),

    #[error("unknown node: {0}")]
    UnknownNode(NodeId),
}

/// The node-graph collaborator consumed by the sequencer core.
///
/// Implementations wrap whatever the host platform provides (a WebAudio
/// bridge, an offline renderer, the in-crate [`CaptureGraph`]). All
/// scheduling-sensitive operations take an optional time in seconds on
/// the graph's own clock; `None` means "as soon as possible".
pub trait AudioGraph: Send {
    /// Current time on the graph's clock, in seconds
    fn now(&self) -> f64;

    /// Resume/unlock the underlying context.
    ///
    /// Platforms gate audio output behind a user gesture; starting the
    /// transport calls this first and must not proceed on failure.
    fn resume(&mut self) -> Result<(), GraphError>;

    /// Create a node of the given kind, initially unconnected
    fn create_node(&mut self, kind: NodeKind) -> NodeId;

    /// Attach decoded interleaved PCM to a sample-player node
    fn load_buffer(&mut self, node: NodeId, frames: &[f32], channels: u16, sample_rate: u32);

    /// Connect `source` output into `dest` input
    fn connect(&mut self, source: NodeId, dest: NodeId);

    /// Connect `source` to the graph's main output
    fn connect_to_output(&mut self, source: NodeId);

    /// Remove all connections from and to `node`
    fn disconnect(&mut self, node: NodeId);

    /// Disconnect and free a node; the handle is dead afterwards
    fn dispose(&mut self, node: NodeId);

    /// Set a parameter instantly (tempo-driven updates, initial values)
    fn set_param(&mut self, node: NodeId, param: Param, value: f64);

    /// Ramp a parameter to `value` over `ramp_secs` (click-free knob moves)
    fn ramp_param(&mut self, node: NodeId, param: Param, value: f64, ramp_secs: f64);

    /// Start a sample player at the scheduled time
    fn start(&mut self, node: NodeId, time: Option<f64>);

    /// Stop a sample player at the scheduled time
    fn stop(&mut self, node: NodeId, time: Option<f64>);

    /// Trigger a synth note (attack) at the scheduled time
    fn note_on(&mut self, node: NodeId, freq: f64, velocity: f32, time: Option<f64>);

    /// Release a synth note at the scheduled time.
    ///
    /// `freq = None` releases everything sounding on the node.
    fn note_off(&mut self, node: NodeId, freq: Option<f64>, time: Option<f64>);
}
