// Bass sound source - monophonic synth over scale degrees
// At most one note sounds at a time; a retrigger always releases the
// previous note strictly before the new attack

use super::{RETRIGGER_OFFSET_SECONDS, TRIGGER_VELOCITY};
use crate::graph::{AudioGraph, NodeId, NodeKind};
use crate::theory::Scale;

/// Monophonic synth source for a bass track
#[derive(Debug)]
pub struct BassSource {
    synth: NodeId,
    sounding: Option<f64>,
}

impl BassSource {
    /// Create the synth node and wire it into the chain input
    pub fn new(graph: &mut dyn AudioGraph, chain_input: NodeId) -> Self {
        let synth = graph.create_node(NodeKind::MonoSynth);
        graph.connect(synth, chain_input);
        Self {
            synth,
            sounding: None,
        }
    }

    /// Frequency currently sounding, if any
    pub fn sounding(&self) -> Option<f64> {
        self.sounding
    }

    /// Apply one step's row: first active degree wins, an empty row
    /// releases whatever is sounding.
    pub fn trigger_step(
        &mut self,
        graph: &mut dyn AudioGraph,
        scale: &Scale,
        row: &[bool],
        time: f64,
    ) {
        match row.iter().position(|&cell| cell) {
            Some(degree) => {
                let freq = scale.degree_to_freq(degree);
                let attack_time = if let Some(prev) = self.sounding.take() {
                    graph.note_off(self.synth, Some(prev), Some(time));
                    time + RETRIGGER_OFFSET_SECONDS
                } else {
                    time
                };
                graph.note_on(self.synth, freq, TRIGGER_VELOCITY, Some(attack_time));
                self.sounding = Some(freq);
            }
            None => {
                if let Some(prev) = self.sounding.take() {
                    graph.note_off(self.synth, Some(prev), Some(time));
                }
            }
        }
    }

    /// Release immediately (transport stop, mute)
    pub fn halt(&mut self, graph: &mut dyn AudioGraph) {
        self.sounding = None;
        graph.note_off(self.synth, None, None);
    }

    /// Release and free the synth node
    pub fn dispose(&mut self, graph: &mut dyn AudioGraph) {
        self.halt(graph);
        graph.disconnect(self.synth);
        graph.dispose(self.synth);
    }
}
