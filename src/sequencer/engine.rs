// Sequencer engine - owns the tracks, drives the transport clock,
// resolves mute/solo, dispatches per-step triggers, pumps sample loads.
// All playback-visible state sits behind one mutex so every tick reads
// a consistent snapshot of patterns and flags.

use crate::effects::EffectChain;
use crate::graph::{AudioGraph, GraphError};
use crate::messaging::{Command, CommandConsumer, Notification, NotificationProducer};
use crate::sampler::{LoadEvent, SampleLoader, SamplePath};
use crate::sequencer::StepCount;
use crate::sequencer::clock::{TickScheduler, TimeSource, TransportClock};
use crate::store::BlobStore;
use crate::theory::{Chord, Scale, default_progression};
use crate::track::{
    BassSource, DrumSource, EffectParamsUpdate, LoadState, PolySource, Track, TrackId, TrackKind,
    TrackType, chord_index,
};
use log::{debug, info, trace, warn};
use ringbuf::traits::{Consumer, Producer};
use std::collections::HashMap;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Tempo bounds enforced at the engine boundary
pub const MIN_BPM: u16 = 20;
pub const MAX_BPM: u16 = 300;

/// Engine error types
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("could not start playback: {0}")]
    Start(#[from] GraphError),

    #[error("unknown track: {0}")]
    UnknownTrack(TrackId),

    #[error("track {0} is not a drum track")]
    NotADrumTrack(TrackId),

    #[error("track {0} has no sample assigned")]
    NoSampleAssigned(TrackId),

    #[error("BPM {0} outside supported range [{MIN_BPM}, {MAX_BPM}]")]
    TempoOutOfRange(u16),

    #[error("track {0} needs a degree index for cell edits")]
    MissingDegree(TrackId),
}

/// A track's sound source nodes, matching its kind
enum SourceNodes {
    Drum(DrumSource),
    Bass(BassSource),
    Poly(PolySource),
}

impl SourceNodes {
    fn halt(&mut self, graph: &mut dyn AudioGraph) {
        match self {
            SourceNodes::Drum(source) => source.halt(graph),
            SourceNodes::Bass(source) => source.halt(graph),
            SourceNodes::Poly(source) => source.halt(graph),
        }
    }

    fn dispose(&mut self, graph: &mut dyn AudioGraph) {
        match self {
            SourceNodes::Drum(source) => source.dispose(graph),
            SourceNodes::Bass(source) => source.dispose(graph),
            SourceNodes::Poly(source) => source.dispose(graph),
        }
    }
}

/// Resource bundle owned per track: its chain plus its sound source.
/// The registry (track id -> bundle) is owned by the engine; nothing
/// else holds node handles.
struct TrackNodes {
    chain: EffectChain,
    source: SourceNodes,
}

/// Mutable engine state shared between the control surface and the
/// clock thread
pub(crate) struct EngineState {
    graph: Box<dyn AudioGraph>,
    tracks: Vec<Track>,
    nodes: HashMap<TrackId, TrackNodes>,
    bpm: u16,
    swing: f32,
    step_count: StepCount,
    current_step: usize,
    scale: Scale,
    progression: Vec<Chord>,
    notifier: Option<NotificationProducer>,
}

impl EngineState {
    fn notify(&mut self, notification: Notification) {
        if let Some(producer) = &mut self.notifier {
            // A slow UI loses notifications rather than stalling audio
            producer.try_push(notification).ok();
        }
    }

    fn track_mut(&mut self, id: TrackId) -> Result<&mut Track, EngineError> {
        self.tracks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(EngineError::UnknownTrack(id))
    }

    fn is_audible(track: &Track, any_solo: bool) -> bool {
        // A track's own mute always wins; solo narrows the rest
        !track.muted && (!any_solo || track.soloed)
    }

    /// Dispatch one step to every audible track, then advance
    pub(crate) fn dispatch_step(&mut self, time: f64) {
        let step = self.current_step;
        let steps = self.step_count.as_steps();
        let step_duration = TickScheduler::step_interval(self.bpm as f32);
        let any_solo = self.tracks.iter().any(|t| t.soloed);
        trace!("dispatching step {step} at {time:.4}");

        let Self {
            graph,
            tracks,
            nodes,
            scale,
            progression,
            ..
        } = self;
        let graph = graph.as_mut();

        for track in tracks.iter() {
            if !Self::is_audible(track, any_solo) {
                continue;
            }
            let Some(bundle) = nodes.get_mut(&track.id) else {
                continue;
            };
            match (&track.kind, &mut bundle.source) {
                (
                    TrackKind::Drum {
                        pattern,
                        gated,
                        load_state,
                        ..
                    },
                    SourceNodes::Drum(source),
                ) => {
                    // Not-Ready tracks drop their triggers silently
                    if pattern.is_active(step) && load_state.is_ready() {
                        source.trigger(graph, time, *gated, step_duration);
                    }
                }
                (TrackKind::Bass { pattern }, SourceNodes::Bass(source)) => {
                    source.trigger_step(graph, scale, pattern.row(step), time);
                }
                (TrackKind::Poly { pattern }, SourceNodes::Poly(source)) => {
                    let index = chord_index(step, progression.len());
                    if let Some(chord) = progression.get(index) {
                        source.trigger_step(graph, chord, pattern.any_active(step), time);
                    }
                }
                _ => {}
            }
        }

        self.current_step = (step + 1) % steps;
        let advanced = self.current_step;
        self.notify(Notification::StepAdvanced(advanced));
    }

    fn insert_track(&mut self, track: Track) -> TrackId {
        let id = track.id;
        let chain = EffectChain::new(
            self.graph.as_mut(),
            &track.effects,
            track.volume_db,
            track.pan,
            self.bpm,
        );
        let source = match track.track_type() {
            TrackType::Drum => SourceNodes::Drum(DrumSource::new()),
            TrackType::Bass => {
                SourceNodes::Bass(BassSource::new(self.graph.as_mut(), chain.input()))
            }
            TrackType::Poly => {
                SourceNodes::Poly(PolySource::new(self.graph.as_mut(), chain.input()))
            }
        };
        self.nodes.insert(id, TrackNodes { chain, source });
        self.tracks.push(track);
        self.notify(Notification::TrackAdded(id));
        id
    }

    fn add_track(&mut self, track_type: TrackType, name: String) -> TrackId {
        let track = Track::new(track_type, name, self.step_count.as_steps());
        debug!("adding {} track {} ({})", track.track_type(), track.name, track.id);
        self.insert_track(track)
    }

    fn remove_track(&mut self, id: TrackId) -> Result<(), EngineError> {
        let index = self
            .tracks
            .iter()
            .position(|t| t.id == id)
            .ok_or(EngineError::UnknownTrack(id))?;

        // Dispose first, remove after: a tick can never reach a bundle
        // whose nodes are already gone
        {
            let Self { graph, nodes, .. } = self;
            if let Some(bundle) = nodes.get_mut(&id) {
                bundle.source.dispose(graph.as_mut());
                bundle.chain.dispose(graph.as_mut());
            }
        }
        self.nodes.remove(&id);
        self.tracks.remove(index);
        self.notify(Notification::TrackRemoved(id));
        Ok(())
    }

    fn halt_all(&mut self) {
        let Self { graph, nodes, .. } = self;
        for bundle in nodes.values_mut() {
            bundle.source.halt(graph.as_mut());
        }
    }

    /// Release anything sounding on tracks that just became inaudible
    fn refresh_audibility(&mut self) {
        let any_solo = self.tracks.iter().any(|t| t.soloed);
        let Self {
            graph,
            tracks,
            nodes,
            ..
        } = self;
        for track in tracks.iter() {
            if !Self::is_audible(track, any_solo) {
                if let Some(bundle) = nodes.get_mut(&track.id) {
                    bundle.source.halt(graph.as_mut());
                }
            }
        }
    }

    fn set_step_count(&mut self, step_count: StepCount) {
        self.step_count = step_count;
        let steps = step_count.as_steps();
        for track in &mut self.tracks {
            track.kind.resize_pattern(steps);
        }
        self.current_step %= steps;
    }

    fn set_tempo(&mut self, bpm: u16) {
        self.bpm = bpm;
        // Delay times follow the tempo instantly across every chain
        let Self {
            graph,
            tracks,
            nodes,
            ..
        } = self;
        for track in tracks.iter() {
            if let Some(bundle) = nodes.get(&track.id) {
                bundle
                    .chain
                    .update_delay_for_bpm(graph.as_mut(), bpm, track.effects.delay_send);
            }
        }
    }

    fn update_effect_params(
        &mut self,
        id: TrackId,
        update: EffectParamsUpdate,
    ) -> Result<(), EngineError> {
        let bpm = self.bpm;
        let track = self.track_mut(id)?;
        track.effects.apply(update);
        let effects = track.effects;

        let Self { graph, nodes, .. } = self;
        if let Some(bundle) = nodes.get(&id) {
            bundle.chain.apply(graph.as_mut(), &effects, bpm);
        }
        Ok(())
    }

    fn set_volume_db(&mut self, id: TrackId, db: f32) -> Result<(), EngineError> {
        let track = self.track_mut(id)?;
        track.set_volume_db(db);
        let volume = track.volume_db;

        let Self { graph, nodes, .. } = self;
        if let Some(bundle) = nodes.get(&id) {
            bundle.chain.set_volume_db(graph.as_mut(), volume);
        }
        Ok(())
    }

    fn set_pan(&mut self, id: TrackId, pan: f32) -> Result<(), EngineError> {
        let track = self.track_mut(id)?;
        track.set_pan(pan);
        let pan = track.pan;

        let Self { graph, nodes, .. } = self;
        if let Some(bundle) = nodes.get(&id) {
            bundle.chain.set_pan(graph.as_mut(), pan);
        }
        Ok(())
    }

    /// Mark a drum track as loading attempt 1 (manual retry, new sample)
    fn begin_load(&mut self, id: TrackId) -> Result<(), EngineError> {
        let track = self.track_mut(id)?;
        match &mut track.kind {
            TrackKind::Drum { load_state, .. } => {
                *load_state = LoadState::Loading(1);
                self.notify(Notification::LoadStateChanged {
                    track_id: id,
                    state: LoadState::Loading(1),
                });
                Ok(())
            }
            _ => Err(EngineError::NotADrumTrack(id)),
        }
    }

    fn apply_load_event(&mut self, event: LoadEvent) {
        match event {
            LoadEvent::State { track_id, state } => {
                // The track may have been removed while the load ran
                let Ok(track) = self.track_mut(track_id) else {
                    return;
                };
                if let TrackKind::Drum { load_state, .. } = &mut track.kind {
                    *load_state = state.clone();
                    self.notify(Notification::LoadStateChanged { track_id, state });
                }
            }
            LoadEvent::Loaded { track_id, sample } => {
                let Self {
                    graph,
                    tracks,
                    nodes,
                    ..
                } = self;
                let Some(track) = tracks.iter_mut().find(|t| t.id == track_id) else {
                    return;
                };
                let TrackKind::Drum { load_state, .. } = &mut track.kind else {
                    return;
                };
                if let Some(bundle) = nodes.get_mut(&track_id) {
                    let input = bundle.chain.input();
                    if let SourceNodes::Drum(source) = &mut bundle.source {
                        source.attach(graph.as_mut(), input, &sample);
                        *load_state = LoadState::Ready;
                        info!("track {track_id}: sample \"{}\" ready", sample.name);
                        self.notify(Notification::LoadStateChanged {
                            track_id,
                            state: LoadState::Ready,
                        });
                    }
                }
            }
        }
    }
}

// A panicked clock tick must not wedge the control surface
fn lock_state(state: &Mutex<EngineState>) -> MutexGuard<'_, EngineState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Take everything currently queued on the loader channel
fn drain_load_events(rx: &Mutex<Receiver<LoadEvent>>) -> Vec<LoadEvent> {
    let rx = rx.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

/// The step-sequencer playback engine.
///
/// Owns the track set and its node registry, drives the
/// [`TransportClock`], and pumps sample-load events from loader threads.
/// The surrounding UI talks to it through direct methods or by feeding
/// [`Command`]s into [`Sequencer::apply`].
pub struct Sequencer {
    state: Arc<Mutex<EngineState>>,
    clock: TransportClock,
    loader: Arc<SampleLoader>,
    load_tx: Sender<LoadEvent>,
    // Shared with the clock thread, which drains it every tick
    load_rx: Arc<Mutex<Receiver<LoadEvent>>>,
}

impl Sequencer {
    pub fn new(graph: Box<dyn AudioGraph>, store: Arc<dyn BlobStore>) -> Self {
        Self::with_clock(graph, store, TransportClock::new())
    }

    /// Build with an explicit time source (deterministic hosts/tests)
    pub fn with_time_source(
        graph: Box<dyn AudioGraph>,
        store: Arc<dyn BlobStore>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self::with_clock(graph, store, TransportClock::with_time_source(time))
    }

    fn with_clock(
        graph: Box<dyn AudioGraph>,
        store: Arc<dyn BlobStore>,
        clock: TransportClock,
    ) -> Self {
        let (load_tx, load_rx) = channel();
        let load_rx = Arc::new(Mutex::new(load_rx));
        Self {
            state: Arc::new(Mutex::new(EngineState {
                graph,
                tracks: Vec::new(),
                nodes: HashMap::new(),
                bpm: 120,
                swing: 0.0,
                step_count: StepCount::default(),
                current_step: 0,
                scale: Scale::default(),
                progression: default_progression(),
                notifier: None,
            })),
            clock,
            loader: Arc::new(SampleLoader::new(store)),
            load_tx,
            load_rx,
        }
    }

    /// Replace the default retry policy (tests shorten the backoff)
    pub fn set_loader(&mut self, loader: SampleLoader) {
        self.loader = Arc::new(loader);
    }

    /// Attach a notification producer feeding the host UI
    pub fn set_notifier(&mut self, producer: NotificationProducer) {
        self.state().notifier = Some(producer);
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        lock_state(&self.state)
    }

    /// Toggle transport.
    ///
    /// Starting resumes the audio context, queues loads for drum tracks
    /// that have a sample assigned but nothing wired, resets the
    /// playhead and starts the clock. If the context cannot resume, the
    /// engine stays fully stopped.
    pub fn play(&mut self) -> Result<(), EngineError> {
        if self.clock.is_running() {
            self.stop();
            return Ok(());
        }
        self.pump();

        let (bpm, swing, pending) = {
            let mut state = self.state();
            state.graph.resume().inspect_err(|err| {
                warn!("playback start refused: {err}");
            })?;
            state.current_step = 0;

            let pending: Vec<(TrackId, SamplePath)> = state
                .tracks
                .iter()
                .filter_map(|t| match &t.kind {
                    TrackKind::Drum {
                        sample_path: Some(path),
                        load_state,
                        ..
                    } if !load_state.is_ready() && !load_state.is_in_flight() => {
                        Some((t.id, path.clone()))
                    }
                    _ => None,
                })
                .collect();
            (state.bpm, state.swing, pending)
        };

        for (id, path) in pending {
            self.state().begin_load(id).ok();
            self.loader.spawn_load(id, path, self.load_tx.clone());
        }

        let shared = Arc::clone(&self.state);
        let loads = Arc::clone(&self.load_rx);
        self.clock.start(bpm, swing, move |time| {
            // Finished loads are wired on the tick path, so a sample
            // that becomes ready mid-playback starts sounding without
            // any host involvement
            for event in drain_load_events(&loads) {
                lock_state(&shared).apply_load_event(event);
            }
            lock_state(&shared).dispatch_step(time);
        });

        self.state().notify(Notification::PlaybackChanged(true));
        Ok(())
    }

    /// Stop the clock, hard-release every voice, reset the playhead
    pub fn stop(&mut self) {
        self.clock.stop();
        let mut state = self.state();
        state.halt_all();
        state.current_step = 0;
        state.notify(Notification::PlaybackChanged(false));
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_running()
    }

    /// Advance one step at the given scheduled time.
    ///
    /// The built-in clock calls this; hosts with their own scheduler
    /// (or offline renderers) can drive it directly.
    pub fn tick(&mut self, time: f64) {
        self.pump();
        self.state().dispatch_step(time);
    }

    /// Drain pending loader events: state transitions and finished
    /// decodes (which wire the player and flip the track to Ready).
    ///
    /// While the built-in clock runs, the tick path drains the same
    /// channel; hosts only need this when the transport is stopped or
    /// when driving playback themselves.
    pub fn pump(&mut self) {
        for event in drain_load_events(&self.load_rx) {
            self.state().apply_load_event(event);
        }
    }

    pub fn set_tempo(&mut self, bpm: u16) -> Result<(), EngineError> {
        if !(MIN_BPM..=MAX_BPM).contains(&bpm) {
            return Err(EngineError::TempoOutOfRange(bpm));
        }
        self.state().set_tempo(bpm);
        self.clock.set_tempo(bpm);
        Ok(())
    }

    pub fn set_swing(&mut self, swing: f32) {
        let swing = swing.clamp(0.0, 1.0);
        self.state().swing = swing;
        self.clock.set_swing(swing);
    }

    /// Resize every track's pattern; identity and loaded samples persist
    pub fn set_step_count(&mut self, step_count: StepCount) {
        self.state().set_step_count(step_count);
    }

    pub fn add_track(&mut self, track_type: TrackType, name: impl Into<String>) -> TrackId {
        self.state().add_track(track_type, name.into())
    }

    /// Dispose the track's chain and source synchronously, then drop it
    pub fn remove_track(&mut self, id: TrackId) -> Result<(), EngineError> {
        self.state().remove_track(id)
    }

    /// Assign a drum sample and start loading it in the background
    pub fn set_sample(&mut self, id: TrackId, path: SamplePath) -> Result<(), EngineError> {
        {
            let mut state = self.state();
            let track = state.track_mut(id)?;
            match &mut track.kind {
                TrackKind::Drum { sample_path, .. } => {
                    *sample_path = Some(path.clone());
                }
                _ => return Err(EngineError::NotADrumTrack(id)),
            }
            state.begin_load(id)?;
        }
        self.loader.spawn_load(id, path, self.load_tx.clone());
        Ok(())
    }

    /// Re-run the bounded loader from attempt 1 (manual retry affordance)
    pub fn retry_load(&mut self, id: TrackId) -> Result<(), EngineError> {
        let path = {
            let mut state = self.state();
            let track = state.track_mut(id)?;
            match &track.kind {
                TrackKind::Drum { sample_path, .. } => sample_path
                    .clone()
                    .ok_or(EngineError::NoSampleAssigned(id))?,
                _ => return Err(EngineError::NotADrumTrack(id)),
            }
        };
        self.state().begin_load(id)?;
        self.loader.spawn_load(id, path, self.load_tx.clone());
        Ok(())
    }

    /// Flip a pattern cell. Drum grids take `degree = None`; bass/poly
    /// rows need the degree index.
    pub fn toggle_cell(
        &mut self,
        id: TrackId,
        step: usize,
        degree: Option<usize>,
    ) -> Result<(), EngineError> {
        let mut state = self.state();
        let track = state.track_mut(id)?;
        match &mut track.kind {
            TrackKind::Drum { pattern, .. } => {
                pattern.toggle(step);
                Ok(())
            }
            TrackKind::Bass { pattern } | TrackKind::Poly { pattern } => {
                let degree = degree.ok_or(EngineError::MissingDegree(id))?;
                pattern.toggle_cell(step, degree);
                Ok(())
            }
        }
    }

    pub fn set_muted(&mut self, id: TrackId, muted: bool) -> Result<(), EngineError> {
        let mut state = self.state();
        state.track_mut(id)?.muted = muted;
        state.refresh_audibility();
        Ok(())
    }

    pub fn set_soloed(&mut self, id: TrackId, soloed: bool) -> Result<(), EngineError> {
        let mut state = self.state();
        state.track_mut(id)?.soloed = soloed;
        state.refresh_audibility();
        Ok(())
    }

    pub fn set_gated(&mut self, id: TrackId, gated: bool) -> Result<(), EngineError> {
        let mut state = self.state();
        let track = state.track_mut(id)?;
        match &mut track.kind {
            TrackKind::Drum { gated: flag, .. } => {
                *flag = gated;
                Ok(())
            }
            _ => Err(EngineError::NotADrumTrack(id)),
        }
    }

    pub fn set_volume_db(&mut self, id: TrackId, db: f32) -> Result<(), EngineError> {
        self.state().set_volume_db(id, db)
    }

    pub fn set_pan(&mut self, id: TrackId, pan: f32) -> Result<(), EngineError> {
        self.state().set_pan(id, pan)
    }

    /// One command for a whole knob gesture; `None` fields stay put
    pub fn update_effect_params(
        &mut self,
        id: TrackId,
        update: EffectParamsUpdate,
    ) -> Result<(), EngineError> {
        self.state().update_effect_params(id, update)
    }

    pub fn set_scale(&mut self, scale: Scale) {
        self.state().scale = scale;
    }

    pub fn set_progression(&mut self, progression: Vec<Chord>) {
        self.state().progression = progression;
    }

    pub fn apply(&mut self, command: Command) -> Result<(), EngineError> {
        match command {
            Command::PlayToggle => self.play(),
            Command::Stop => {
                self.stop();
                Ok(())
            }
            Command::SetTempo(bpm) => self.set_tempo(bpm),
            Command::SetSwing(swing) => {
                self.set_swing(swing);
                Ok(())
            }
            Command::SetStepCount(step_count) => {
                self.set_step_count(step_count);
                Ok(())
            }
            Command::AddTrack { track_type, name } => {
                self.add_track(track_type, name);
                Ok(())
            }
            Command::RemoveTrack(id) => self.remove_track(id),
            Command::SetSample { track_id, path } => self.set_sample(track_id, path),
            Command::RetryLoad(track_id) => self.retry_load(track_id),
            Command::ToggleCell {
                track_id,
                step,
                degree,
            } => self.toggle_cell(track_id, step, degree),
            Command::SetMuted { track_id, muted } => self.set_muted(track_id, muted),
            Command::SetSoloed { track_id, soloed } => self.set_soloed(track_id, soloed),
            Command::SetGated { track_id, gated } => self.set_gated(track_id, gated),
            Command::SetVolume { track_id, db } => self.set_volume_db(track_id, db),
            Command::SetPan { track_id, pan } => self.set_pan(track_id, pan),
            Command::UpdateEffectParams { track_id, update } => {
                self.update_effect_params(track_id, update)
            }
        }
    }

    /// Drain the UI's command queue into the engine.
    ///
    /// Rejected commands (unknown track, tempo out of range) are logged
    /// and skipped; one bad command never stalls the ones behind it.
    pub fn drain_commands(&mut self, commands: &mut CommandConsumer) {
        while let Some(command) = commands.try_pop() {
            if let Err(err) = self.apply(command) {
                warn!("command rejected: {err}");
            }
        }
    }

    // Read accessors return clones so the lock is never held by callers

    pub fn tracks(&self) -> Vec<Track> {
        self.state().tracks.clone()
    }

    pub fn track(&self, id: TrackId) -> Option<Track> {
        self.state().tracks.iter().find(|t| t.id == id).cloned()
    }

    pub fn current_step(&self) -> usize {
        self.state().current_step
    }

    pub fn step_count(&self) -> StepCount {
        self.state().step_count
    }

    pub fn bpm(&self) -> u16 {
        self.state().bpm
    }

    pub fn swing(&self) -> f32 {
        self.state().swing
    }

    pub fn scale(&self) -> Scale {
        self.state().scale.clone()
    }

    pub fn progression(&self) -> Vec<Chord> {
        self.state().progression.clone()
    }

    pub(crate) fn snapshot_state<R>(&self, f: impl FnOnce(&EngineState) -> R) -> R {
        f(&self.state())
    }

    pub(crate) fn restore_state(&mut self, f: impl FnOnce(&mut EngineState)) {
        f(&mut self.state())
    }

    /// Re-align the clock's live tempo and swing with the engine state
    pub(crate) fn sync_clock(&self) {
        let (bpm, swing) = {
            let state = self.state();
            (state.bpm, state.swing)
        };
        self.clock.set_tempo(bpm);
        self.clock.set_swing(swing);
    }

    pub(crate) fn queue_load(&mut self, id: TrackId, path: SamplePath) {
        self.state().begin_load(id).ok();
        self.loader.spawn_load(id, path, self.load_tx.clone());
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        // Deterministic teardown: stop the clock, then free every node
        self.clock.stop();
        let mut state = self.state();
        let ids: Vec<TrackId> = state.tracks.iter().map(|t| t.id).collect();
        for id in ids {
            state.remove_track(id).ok();
        }
    }
}

// Session snapshot/restore needs structured access to the state
impl EngineState {
    pub(crate) fn session_fields(
        &self,
    ) -> (u16, f32, StepCount, &Scale, &[Chord], &[Track]) {
        (
            self.bpm,
            self.swing,
            self.step_count,
            &self.scale,
            &self.progression,
            &self.tracks,
        )
    }

    pub(crate) fn reset_session(
        &mut self,
        bpm: u16,
        swing: f32,
        step_count: StepCount,
        scale: Scale,
        progression: Vec<Chord>,
    ) {
        let ids: Vec<TrackId> = self.tracks.iter().map(|t| t.id).collect();
        for id in ids {
            self.remove_track(id).ok();
        }
        // Session files are hand-editable; out-of-range transport
        // values are clamped rather than trusted
        self.bpm = bpm.clamp(MIN_BPM, MAX_BPM);
        self.swing = swing.clamp(0.0, 1.0);
        self.step_count = step_count;
        self.current_step = 0;
        self.scale = scale;
        self.progression = progression;
    }

    pub(crate) fn restore_track(&mut self, track: Track) -> TrackId {
        self.insert_track(track)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CaptureGraph, GraphTrace};
    use crate::store::MemoryBlobStore;
    use std::time::{Duration, Instant};

    fn capture_sequencer() -> (Sequencer, GraphTrace) {
        let graph = CaptureGraph::new();
        let trace = graph.trace();
        let seq = Sequencer::new(Box::new(graph), Arc::new(MemoryBlobStore::new()));
        (seq, trace)
    }

    fn wav_fixture() -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut bytes = Vec::new();
        {
            let mut writer =
                hound::WavWriter::new(std::io::Cursor::new(&mut bytes), spec).unwrap();
            for _ in 0..64 {
                writer.write_sample(1000i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        bytes
    }

    fn wait_until_ready(seq: &mut Sequencer, id: TrackId) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            seq.pump();
            if let Some(track) = seq.track(id) {
                if track.load_state() == Some(&LoadState::Ready) {
                    return;
                }
            }
            assert!(Instant::now() < deadline, "sample never became ready");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_add_track_wires_chain_and_source() {
        let (mut seq, trace) = capture_sequencer();

        seq.add_track(TrackType::Drum, "Kick");
        // Chain: filter, delay, reverb, gain, panner (player comes later)
        assert_eq!(trace.live_nodes().len(), 5);

        seq.add_track(TrackType::Bass, "Bass");
        // Another chain plus the mono synth
        assert_eq!(trace.live_nodes().len(), 11);
    }

    #[test]
    fn test_remove_track_disposes_everything() {
        let (mut seq, trace) = capture_sequencer();
        let drum = seq.add_track(TrackType::Drum, "Kick");
        let bass = seq.add_track(TrackType::Bass, "Bass");

        seq.remove_track(bass).unwrap();
        assert_eq!(trace.live_nodes().len(), 5);

        seq.remove_track(drum).unwrap();
        assert!(trace.live_nodes().is_empty());

        assert!(matches!(
            seq.remove_track(drum),
            Err(EngineError::UnknownTrack(_))
        ));
    }

    #[test]
    fn test_step_count_resize_keeps_identity() {
        let (mut seq, _trace) = capture_sequencer();
        let id = seq.add_track(TrackType::Drum, "Kick");
        seq.toggle_cell(id, 3, None).unwrap();

        seq.set_step_count(StepCount::Four);
        let track = seq.track(id).unwrap();
        assert_eq!(track.kind.pattern_len(), 4);

        seq.set_step_count(StepCount::SixtyFour);
        let track = seq.track(id).unwrap();
        assert_eq!(track.kind.pattern_len(), 64);
        if let TrackKind::Drum { pattern, .. } = &track.kind {
            assert!(pattern.is_active(3));
        } else {
            panic!("expected drum kind");
        }
    }

    #[test]
    fn test_tempo_bounds_enforced() {
        let (mut seq, _trace) = capture_sequencer();
        assert!(matches!(
            seq.set_tempo(19),
            Err(EngineError::TempoOutOfRange(19))
        ));
        assert!(matches!(
            seq.set_tempo(301),
            Err(EngineError::TempoOutOfRange(301))
        ));
        seq.set_tempo(300).unwrap();
        assert_eq!(seq.bpm(), 300);
    }

    #[test]
    fn test_play_failure_leaves_stopped_state() {
        let (mut seq, trace) = capture_sequencer();
        trace.fail_next_resume("no user gesture yet");

        let err = seq.play().unwrap_err();
        assert!(matches!(err, EngineError::Start(_)));
        assert!(!seq.is_playing());
        assert_eq!(seq.current_step(), 0);

        // Second attempt succeeds once the context resumes
        seq.play().unwrap();
        assert!(seq.is_playing());
        seq.stop();
        assert!(!seq.is_playing());
    }

    #[test]
    fn test_play_is_a_toggle() {
        let (mut seq, _trace) = capture_sequencer();
        seq.play().unwrap();
        assert!(seq.is_playing());
        seq.play().unwrap();
        assert!(!seq.is_playing());
    }

    #[test]
    fn test_stop_halts_sounding_sources_and_resets_step() {
        let (mut seq, trace) = capture_sequencer();
        let bass = seq.add_track(TrackType::Bass, "Bass");
        seq.toggle_cell(bass, 0, Some(0)).unwrap();

        seq.tick(0.0);
        assert_eq!(seq.current_step(), 1);
        assert_eq!(trace.note_ons().len(), 1);

        seq.stop();
        assert_eq!(seq.current_step(), 0);
        // The mono synth got a release-everything note_off
        let offs = trace.note_offs();
        assert!(offs.iter().any(|&(_, freq, time)| freq.is_none() && time.is_none()));
    }

    #[test]
    fn test_mute_silences_and_releases() {
        let (mut seq, trace) = capture_sequencer();
        let bass = seq.add_track(TrackType::Bass, "Bass");
        seq.toggle_cell(bass, 0, Some(0)).unwrap();
        seq.tick(0.0);
        assert_eq!(trace.note_ons().len(), 1);

        seq.set_muted(bass, true).unwrap();
        // Mute released the sounding note immediately
        assert!(trace.note_offs().iter().any(|&(_, f, t)| f.is_none() && t.is_none()));

        trace.clear_events();
        seq.tick(0.125);
        assert!(trace.note_ons().is_empty());
    }

    #[test]
    fn test_drum_loads_and_triggers_when_ready() {
        let store = Arc::new(MemoryBlobStore::new());
        store.insert("recordings/kick", wav_fixture());
        let graph = CaptureGraph::new();
        let trace = graph.trace();
        let mut seq = Sequencer::new(Box::new(graph), store);

        let id = seq.add_track(TrackType::Drum, "Kick");
        seq.toggle_cell(id, 0, None).unwrap();

        // Not ready yet: the trigger is dropped
        seq.tick(0.0);
        assert!(trace.starts().is_empty());

        seq.set_sample(id, SamplePath::Stored("recordings/kick".into()))
            .unwrap();
        wait_until_ready(&mut seq, id);

        seq.restore_state(|s| s.current_step = 0);
        seq.tick(1.0);
        assert_eq!(trace.starts(), vec![(trace.starts()[0].0, Some(1.0))]);
    }

    #[test]
    fn test_gate_truncates_at_exactly_one_step() {
        let store = Arc::new(MemoryBlobStore::new());
        store.insert("recordings/hat", wav_fixture());
        let graph = CaptureGraph::new();
        let trace = graph.trace();
        let mut seq = Sequencer::new(Box::new(graph), store);

        let id = seq.add_track(TrackType::Drum, "Hat");
        seq.toggle_cell(id, 0, None).unwrap();
        seq.set_gated(id, true).unwrap();
        seq.set_sample(id, SamplePath::Stored("recordings/hat".into()))
            .unwrap();
        wait_until_ready(&mut seq, id);

        seq.restore_state(|s| s.current_step = 0);
        trace.clear_events();
        seq.tick(2.0);

        // 120 BPM: 16th = 0.125s, stop scheduled at exactly T + 0.125
        assert_eq!(trace.stops().len(), 1);
        assert_eq!(trace.stops()[0].1, Some(2.125));
    }

    #[test]
    fn test_running_clock_applies_finished_loads() {
        let store = Arc::new(MemoryBlobStore::new());
        store.insert("recordings/kick", wav_fixture());
        let graph = CaptureGraph::new();
        let trace = graph.trace();
        let mut seq = Sequencer::new(Box::new(graph), store);

        let id = seq.add_track(TrackType::Drum, "Kick");
        for step in 0..16 {
            seq.toggle_cell(id, step, None).unwrap();
        }

        seq.set_sample(id, SamplePath::Stored("recordings/kick".into()))
            .unwrap();
        seq.play().unwrap();

        // No pump() calls: the tick path alone must wire the sample
        // and start it sounding
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let ready = seq.track(id).and_then(|t| t.load_state().cloned())
                == Some(LoadState::Ready);
            if ready && !trace.starts().is_empty() {
                break;
            }
            assert!(
                Instant::now() < deadline,
                "running clock never applied the finished load"
            );
            std::thread::sleep(Duration::from_millis(10));
        }
        seq.stop();
    }

    #[test]
    fn test_drain_commands_applies_queue_and_skips_rejected() {
        let (mut seq, _trace) = capture_sequencer();
        let (mut tx, mut rx) = crate::messaging::create_command_channel(8);

        tx.try_push(Command::AddTrack {
            track_type: TrackType::Drum,
            name: "Kick".into(),
        })
        .unwrap();
        // Out of range, rejected without stalling the queue
        tx.try_push(Command::SetTempo(999)).unwrap();
        tx.try_push(Command::SetSwing(0.5)).unwrap();

        seq.drain_commands(&mut rx);

        assert_eq!(seq.tracks().len(), 1);
        assert_eq!(seq.bpm(), 120);
        assert_eq!(seq.swing(), 0.5);
    }

    #[test]
    fn test_commands_route_to_methods() {
        let (mut seq, _trace) = capture_sequencer();
        seq.apply(Command::AddTrack {
            track_type: TrackType::Poly,
            name: "Pads".into(),
        })
        .unwrap();
        assert_eq!(seq.tracks().len(), 1);

        seq.apply(Command::SetTempo(90)).unwrap();
        assert_eq!(seq.bpm(), 90);

        let id = seq.tracks()[0].id;
        seq.apply(Command::UpdateEffectParams {
            track_id: id,
            update: EffectParamsUpdate {
                reverb_send: Some(0.7),
                ..Default::default()
            },
        })
        .unwrap();
        assert_eq!(seq.track(id).unwrap().effects.reverb_send, 0.7);
    }
}
