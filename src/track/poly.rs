// Poly sound source - chordal synth gated by the pattern row
// Chord identity comes from the step index alone: floor(step / 4)
// cycling through the progression, regardless of which cells are marked

use super::{RETRIGGER_OFFSET_SECONDS, TRIGGER_VELOCITY};
use crate::graph::{AudioGraph, NodeId, NodeKind};
use crate::theory::Chord;

/// Progression index for a step.
///
/// Fixed at groups of four 16ths per chord for every step count; the
/// pattern row only gates whether the chord fires.
pub fn chord_index(step: usize, progression_len: usize) -> usize {
    if progression_len == 0 {
        return 0;
    }
    (step / 4) % progression_len
}

/// Polyphonic synth source for a poly track
#[derive(Debug)]
pub struct PolySource {
    synth: NodeId,
    sounding: Vec<f64>,
}

impl PolySource {
    /// Create the synth node and wire it into the chain input
    pub fn new(graph: &mut dyn AudioGraph, chain_input: NodeId) -> Self {
        let synth = graph.create_node(NodeKind::PolySynth);
        graph.connect(synth, chain_input);
        Self {
            synth,
            sounding: Vec::new(),
        }
    }

    /// Frequencies currently sounding
    pub fn sounding(&self) -> &[f64] {
        &self.sounding
    }

    /// Fire the full chord if the step's gate is open.
    ///
    /// The previous chord is released at the step time and the new one
    /// attacks just after, same separation rule as the bass.
    pub fn trigger_step(
        &mut self,
        graph: &mut dyn AudioGraph,
        chord: &Chord,
        gate_open: bool,
        time: f64,
    ) {
        if !gate_open {
            return;
        }

        let attack_time = if self.sounding.is_empty() {
            time
        } else {
            for &freq in &self.sounding {
                graph.note_off(self.synth, Some(freq), Some(time));
            }
            self.sounding.clear();
            time + RETRIGGER_OFFSET_SECONDS
        };

        let freqs = chord.frequencies();
        for &freq in &freqs {
            graph.note_on(self.synth, freq, TRIGGER_VELOCITY, Some(attack_time));
        }
        self.sounding = freqs;
    }

    /// Release immediately (transport stop, mute)
    pub fn halt(&mut self, graph: &mut dyn AudioGraph) {
        self.sounding.clear();
        graph.note_off(self.synth, None, None);
    }

    /// Release and free the synth node
    pub fn dispose(&mut self, graph: &mut dyn AudioGraph) {
        self.halt(graph);
        graph.disconnect(self.synth);
        graph.dispose(self.synth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::CaptureGraph;
    use crate::theory::ChordQuality;

    #[test]
    fn test_chord_index_groups_of_four() {
        // 4-chord progression: steps 0..3 -> 0, 4..7 -> 1, 8..11 -> 2,
        // 12..15 -> 3, then wrap
        assert_eq!(chord_index(0, 4), 0);
        assert_eq!(chord_index(3, 4), 0);
        assert_eq!(chord_index(4, 4), 1);
        assert_eq!(chord_index(8, 4), 2);
        assert_eq!(chord_index(12, 4), 3);
        assert_eq!(chord_index(16, 4), 0);
        // Longer step counts keep cycling the same formula
        assert_eq!(chord_index(30, 4), 3);
        assert_eq!(chord_index(63, 4), 3);
    }

    #[test]
    fn test_chord_index_empty_progression() {
        assert_eq!(chord_index(12, 0), 0);
    }

    #[test]
    fn test_closed_gate_is_silent() {
        let mut graph = CaptureGraph::new();
        let trace = graph.trace();
        let input = graph.create_node(NodeKind::Filter);
        let chord = Chord::new(57, ChordQuality::Minor);

        let mut source = PolySource::new(&mut graph, input);
        trace.clear_events();
        source.trigger_step(&mut graph, &chord, false, 1.0);

        assert!(trace.events().is_empty());
    }

    #[test]
    fn test_full_chord_attacks_simultaneously() {
        let mut graph = CaptureGraph::new();
        let trace = graph.trace();
        let input = graph.create_node(NodeKind::Filter);
        let chord = Chord::new(57, ChordQuality::Minor7);

        let mut source = PolySource::new(&mut graph, input);
        source.trigger_step(&mut graph, &chord, true, 2.0);

        let ons = trace.note_ons();
        assert_eq!(ons.len(), 4);
        assert!(ons.iter().all(|&(_, _, t)| t == Some(2.0)));
    }

    #[test]
    fn test_retrigger_releases_previous_chord_first() {
        let mut graph = CaptureGraph::new();
        let trace = graph.trace();
        let input = graph.create_node(NodeKind::Filter);
        let am = Chord::new(57, ChordQuality::Minor);
        let f = Chord::new(53, ChordQuality::Major);

        let mut source = PolySource::new(&mut graph, input);
        source.trigger_step(&mut graph, &am, true, 1.0);
        source.trigger_step(&mut graph, &f, true, 1.5);

        let offs = trace.note_offs();
        assert_eq!(offs.len(), 3);
        assert!(offs.iter().all(|&(_, _, t)| t == Some(1.5)));

        let ons = trace.note_ons();
        let second_attack: Vec<_> = ons.iter().skip(3).collect();
        assert_eq!(second_attack.len(), 3);
        assert!(
            second_attack
                .iter()
                .all(|&&(_, _, t)| t == Some(1.5 + RETRIGGER_OFFSET_SECONDS))
        );
        assert_eq!(source.sounding().len(), 3);
    }
}
