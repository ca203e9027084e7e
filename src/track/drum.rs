// Drum sound source - one sample player per track
// The player only exists once a sample has loaded; until then the
// source is silent and triggers fall through

use crate::graph::{AudioGraph, NodeId, NodeKind};
use crate::sampler::DecodedSample;

/// Sample-player sound source for a drum track
#[derive(Debug, Default)]
pub struct DrumSource {
    player: Option<NodeId>,
}

impl DrumSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_attached(&self) -> bool {
        self.player.is_some()
    }

    /// Wire a fresh player for the decoded sample into the chain input.
    ///
    /// Any previous player is disposed first, so a reload or retry never
    /// leaves a dangling or doubly-registered node behind.
    pub fn attach(
        &mut self,
        graph: &mut dyn AudioGraph,
        chain_input: NodeId,
        sample: &DecodedSample,
    ) {
        self.detach(graph);

        let player = graph.create_node(NodeKind::SamplePlayer);
        graph.load_buffer(player, &sample.frames, sample.channels, sample.sample_rate);
        graph.connect(player, chain_input);
        self.player = Some(player);
    }

    /// Dispose the current player, if any
    pub fn detach(&mut self, graph: &mut dyn AudioGraph) {
        if let Some(player) = self.player.take() {
            graph.disconnect(player);
            graph.dispose(player);
        }
    }

    /// Fire the sample at the scheduled time.
    ///
    /// Gated hits are stopped exactly one step later even if the sample
    /// runs longer; ungated hits play out (or until re-triggered).
    pub fn trigger(&self, graph: &mut dyn AudioGraph, time: f64, gated: bool, step_duration: f64) {
        let Some(player) = self.player else {
            return;
        };
        graph.start(player, Some(time));
        if gated {
            graph.stop(player, Some(time + step_duration));
        }
    }

    /// Stop immediately, scheduled-time-free (transport stop)
    pub fn halt(&self, graph: &mut dyn AudioGraph) {
        if let Some(player) = self.player {
            graph.stop(player, None);
        }
    }

    /// Release everything this source owns
    pub fn dispose(&mut self, graph: &mut dyn AudioGraph) {
        self.detach(graph);
    }
}
