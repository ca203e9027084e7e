// Effect chain - fixed per-track topology: filter -> delay -> reverb
// -> gain -> pan -> output. Parameter moves ramp over ~100ms so live
// knob drags stay click-free; tempo-driven delay-time updates are the
// one instant exception.

use crate::graph::{AudioGraph, NodeId, NodeKind, Param};
use crate::track::{EffectParams, db_to_gain};

/// Ramp length for live parameter changes
pub const PARAM_RAMP_SECONDS: f64 = 0.1;

/// Delay time derived from the tempo and the send level:
/// half a beat at full send, scaled down with the send.
pub fn delay_time_seconds(bpm: u16, send: f32) -> f64 {
    (60.0 / bpm as f64) / 2.0 * send as f64
}

/// The per-track processing chain.
///
/// Owns five nodes for its lifetime; disposal frees every one of them.
#[derive(Debug)]
pub struct EffectChain {
    filter: NodeId,
    delay: NodeId,
    reverb: NodeId,
    gain: NodeId,
    panner: NodeId,
}

impl EffectChain {
    /// Build and wire the chain, seeding all parameters instantly
    pub fn new(
        graph: &mut dyn AudioGraph,
        params: &EffectParams,
        volume_db: f32,
        pan: f32,
        bpm: u16,
    ) -> Self {
        let filter = graph.create_node(NodeKind::Filter);
        let delay = graph.create_node(NodeKind::Delay);
        let reverb = graph.create_node(NodeKind::Reverb);
        let gain = graph.create_node(NodeKind::Gain);
        let panner = graph.create_node(NodeKind::Panner);

        graph.connect(filter, delay);
        graph.connect(delay, reverb);
        graph.connect(reverb, gain);
        graph.connect(gain, panner);
        graph.connect_to_output(panner);

        graph.set_param(filter, Param::FilterCutoff, params.cutoff_hz as f64);
        graph.set_param(filter, Param::FilterQ, params.resonance as f64);
        graph.set_param(delay, Param::DelayWet, params.delay_send as f64);
        graph.set_param(delay, Param::DelayTime, delay_time_seconds(bpm, params.delay_send));
        graph.set_param(reverb, Param::ReverbWet, params.reverb_send as f64);
        graph.set_param(gain, Param::Gain, db_to_gain(volume_db));
        graph.set_param(panner, Param::Pan, pan as f64);

        Self {
            filter,
            delay,
            reverb,
            gain,
            panner,
        }
    }

    /// Where a track's sound source connects
    pub fn input(&self) -> NodeId {
        self.filter
    }

    pub fn set_filter(&self, graph: &mut dyn AudioGraph, cutoff_hz: f32, q: f32) {
        graph.ramp_param(self.filter, Param::FilterCutoff, cutoff_hz as f64, PARAM_RAMP_SECONDS);
        graph.ramp_param(self.filter, Param::FilterQ, q as f64, PARAM_RAMP_SECONDS);
    }

    pub fn set_delay(&self, graph: &mut dyn AudioGraph, send: f32, bpm: u16) {
        graph.ramp_param(self.delay, Param::DelayWet, send as f64, PARAM_RAMP_SECONDS);
        graph.ramp_param(
            self.delay,
            Param::DelayTime,
            delay_time_seconds(bpm, send),
            PARAM_RAMP_SECONDS,
        );
    }

    pub fn set_reverb(&self, graph: &mut dyn AudioGraph, send: f32) {
        graph.ramp_param(self.reverb, Param::ReverbWet, send as f64, PARAM_RAMP_SECONDS);
    }

    pub fn set_volume_db(&self, graph: &mut dyn AudioGraph, db: f32) {
        graph.ramp_param(self.gain, Param::Gain, db_to_gain(db), PARAM_RAMP_SECONDS);
    }

    pub fn set_pan(&self, graph: &mut dyn AudioGraph, pan: f32) {
        graph.ramp_param(self.panner, Param::Pan, pan as f64, PARAM_RAMP_SECONDS);
    }

    /// Ramp everything to a full parameter set (partial-update commands
    /// resolve to the merged params before landing here)
    pub fn apply(&self, graph: &mut dyn AudioGraph, params: &EffectParams, bpm: u16) {
        self.set_filter(graph, params.cutoff_hz, params.resonance);
        self.set_delay(graph, params.delay_send, bpm);
        self.set_reverb(graph, params.reverb_send);
    }

    /// Tempo changed: recompute delay time instantly, no ramp
    pub fn update_delay_for_bpm(&self, graph: &mut dyn AudioGraph, bpm: u16, send: f32) {
        graph.set_param(self.delay, Param::DelayTime, delay_time_seconds(bpm, send));
    }

    /// Disconnect and free every node in the chain
    pub fn dispose(&self, graph: &mut dyn AudioGraph) {
        for node in [self.filter, self.delay, self.reverb, self.gain, self.panner] {
            graph.disconnect(node);
            graph.dispose(node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CaptureGraph, GraphEvent};

    #[test]
    fn test_topology_is_wired_in_order() {
        let mut graph = CaptureGraph::new();
        let trace = graph.trace();

        let chain = EffectChain::new(&mut graph, &EffectParams::default(), -6.0, 0.0, 120);

        let connects: Vec<_> = trace
            .events()
            .into_iter()
            .filter(|e| {
                matches!(
                    e,
                    GraphEvent::Connected { .. } | GraphEvent::ConnectedToOutput { .. }
                )
            })
            .collect();

        assert_eq!(connects.len(), 5);
        assert_eq!(chain.input(), 0);
        assert_eq!(connects[0], GraphEvent::Connected { source: 0, dest: 1 });
        assert_eq!(connects[3], GraphEvent::Connected { source: 3, dest: 4 });
        assert_eq!(connects[4], GraphEvent::ConnectedToOutput { node: 4 });
    }

    #[test]
    fn test_knob_moves_are_ramped() {
        let mut graph = CaptureGraph::new();
        let trace = graph.trace();
        let chain = EffectChain::new(&mut graph, &EffectParams::default(), -6.0, 0.0, 120);
        trace.clear_events();

        chain.set_filter(&mut graph, 440.0, 4.0);
        chain.set_reverb(&mut graph, 0.5);

        let events = trace.events();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| matches!(
            e,
            GraphEvent::ParamRamped { ramp_secs, .. } if *ramp_secs == PARAM_RAMP_SECONDS
        )));
    }

    #[test]
    fn test_delay_time_follows_bpm_and_send() {
        // 120 BPM: beat = 0.5s, half beat = 0.25s, scaled by send
        assert!((delay_time_seconds(120, 1.0) - 0.25).abs() < 1e-12);
        assert!((delay_time_seconds(120, 0.5) - 0.125).abs() < 1e-12);
        assert!((delay_time_seconds(60, 1.0) - 0.5).abs() < 1e-12);
        assert_eq!(delay_time_seconds(120, 0.0), 0.0);
    }

    #[test]
    fn test_bpm_update_is_instant_not_ramped() {
        let mut graph = CaptureGraph::new();
        let trace = graph.trace();
        let chain = EffectChain::new(&mut graph, &EffectParams::default(), -6.0, 0.0, 120);
        trace.clear_events();

        chain.update_delay_for_bpm(&mut graph, 90, 0.5);

        let events = trace.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            GraphEvent::ParamSet { param: Param::DelayTime, .. }
        ));
    }

    #[test]
    fn test_dispose_frees_all_five_nodes() {
        let mut graph = CaptureGraph::new();
        let trace = graph.trace();
        let chain = EffectChain::new(&mut graph, &EffectParams::default(), -6.0, 0.0, 120);
        assert_eq!(trace.live_nodes().len(), 5);

        chain.dispose(&mut graph);
        assert!(trace.live_nodes().is_empty());
    }
}
