// Capture backend - records every graph operation with its scheduled time
// Used by the test suite and for offline dry runs of a session

use super::{AudioGraph, GraphError, NodeId, NodeKind, Param};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// One recorded graph operation
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    Resumed,
    Created { node: NodeId, kind: NodeKind },
    BufferLoaded { node: NodeId, frames: usize, channels: u16, sample_rate: u32 },
    Connected { source: NodeId, dest: NodeId },
    ConnectedToOutput { node: NodeId },
    Disconnected { node: NodeId },
    Disposed { node: NodeId },
    ParamSet { node: NodeId, param: Param, value: f64 },
    ParamRamped { node: NodeId, param: Param, value: f64, ramp_secs: f64 },
    Started { node: NodeId, time: Option<f64> },
    Stopped { node: NodeId, time: Option<f64> },
    NoteOn { node: NodeId, freq: f64, velocity: f32, time: Option<f64> },
    NoteOff { node: NodeId, freq: Option<f64>, time: Option<f64> },
}

#[derive(Debug, Default)]
struct CaptureState {
    events: Vec<GraphEvent>,
    next_id: NodeId,
    live: HashSet<NodeId>,
    now: f64,
    fail_resume: Option<String>,
}

/// Shared view into a [`CaptureGraph`]'s recorded state.
///
/// Clones share the same underlying trace, so a test can keep a handle
/// while the graph itself is owned by the engine.
#[derive(Clone, Default)]
pub struct GraphTrace {
    state: Arc<Mutex<CaptureState>>,
}

impl GraphTrace {
    /// All recorded events, in call order
    pub fn events(&self) -> Vec<GraphEvent> {
        self.state.lock().unwrap().events.clone()
    }

    /// Nodes created and not yet disposed
    pub fn live_nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> =
            self.state.lock().unwrap().live.iter().copied().collect();
        nodes.sort_unstable();
        nodes
    }

    /// Advance the graph clock (tests control time explicitly)
    pub fn set_now(&self, now: f64) {
        self.state.lock().unwrap().now = now;
    }

    /// Make the next `resume()` call fail with the given message
    pub fn fail_next_resume(&self, message: &str) {
        self.state.lock().unwrap().fail_resume = Some(message.to_string());
    }

    /// Recorded `NoteOn` events as (node, freq, time) tuples
    pub fn note_ons(&self) -> Vec<(NodeId, f64, Option<f64>)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                GraphEvent::NoteOn { node, freq, time, .. } => Some((node, freq, time)),
                _ => None,
            })
            .collect()
    }

    /// Recorded `NoteOff` events as (node, freq, time) tuples
    pub fn note_offs(&self) -> Vec<(NodeId, Option<f64>, Option<f64>)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                GraphEvent::NoteOff { node, freq, time } => Some((node, freq, time)),
                _ => None,
            })
            .collect()
    }

    /// Recorded player `Started` events as (node, time) tuples
    pub fn starts(&self) -> Vec<(NodeId, Option<f64>)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                GraphEvent::Started { node, time } => Some((node, time)),
                _ => None,
            })
            .collect()
    }

    /// Recorded player `Stopped` events as (node, time) tuples
    pub fn stops(&self) -> Vec<(NodeId, Option<f64>)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                GraphEvent::Stopped { node, time } => Some((node, time)),
                _ => None,
            })
            .collect()
    }

    /// Drop all recorded events (live-node bookkeeping is kept)
    pub fn clear_events(&self) {
        self.state.lock().unwrap().events.clear();
    }
}

/// An [`AudioGraph`] that produces no sound and records everything.
pub struct CaptureGraph {
    state: Arc<Mutex<CaptureState>>,
}

impl CaptureGraph {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(CaptureState::default())),
        }
    }

    /// Shareable handle onto this graph's recorded state
    pub fn trace(&self) -> GraphTrace {
        GraphTrace {
            state: Arc::clone(&self.state),
        }
    }

    fn record(&mut self, event: GraphEvent) {
        self.state.lock().unwrap().events.push(event);
    }
}

impl Default for CaptureGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioGraph for CaptureGraph {
    fn now(&self) -> f64 {
        self.state.lock().unwrap().now
    }

    fn resume(&mut self) -> Result<(), GraphError> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.fail_resume.take() {
            return Err(GraphError::Unavailable(message));
        }
        state.events.push(GraphEvent::Resumed);
        Ok(())
    }

    fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let mut state = self.state.lock().unwrap();
        let node = state.next_id;
        state.next_id += 1;
        state.live.insert(node);
        state.events.push(GraphEvent::Created { node, kind });
        node
    }

    fn load_buffer(&mut self, node: NodeId, frames: &[f32], channels: u16, sample_rate: u32) {
        self.record(GraphEvent::BufferLoaded {
            node,
            frames: frames.len(),
            channels,
            sample_rate,
        });
    }

    fn connect(&mut self, source: NodeId, dest: NodeId) {
        self.record(GraphEvent::Connected { source, dest });
    }

    fn connect_to_output(&mut self, node: NodeId) {
        self.record(GraphEvent::ConnectedToOutput { node });
    }

    fn disconnect(&mut self, node: NodeId) {
        self.record(GraphEvent::Disconnected { node });
    }

    fn dispose(&mut self, node: NodeId) {
        let mut state = self.state.lock().unwrap();
        state.live.remove(&node);
        state.events.push(GraphEvent::Disposed { node });
    }

    fn set_param(&mut self, node: NodeId, param: Param, value: f64) {
        self.record(GraphEvent::ParamSet { node, param, value });
    }

    fn ramp_param(&mut self, node: NodeId, param: Param, value: f64, ramp_secs: f64) {
        self.record(GraphEvent::ParamRamped { node, param, value, ramp_secs });
    }

    fn start(&mut self, node: NodeId, time: Option<f64>) {
        self.record(GraphEvent::Started { node, time });
    }

    fn stop(&mut self, node: NodeId, time: Option<f64>) {
        self.record(GraphEvent::Stopped { node, time });
    }

    fn note_on(&mut self, node: NodeId, freq: f64, velocity: f32, time: Option<f64>) {
        self.record(GraphEvent::NoteOn { node, freq, velocity, time });
    }

    fn note_off(&mut self, node: NodeId, freq: Option<f64>, time: Option<f64>) {
        self.record(GraphEvent::NoteOff { node, freq, time });
    }
}
