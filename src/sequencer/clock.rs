// Transport clock - lookahead scheduling of 16th-note ticks
// Ticks are computed slightly ahead of their audible time so trigger
// calls stay sample-accurate under host-thread jitter

use log::info;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// How far ahead of the audible time ticks are handed out
pub const LOOKAHEAD_SECONDS: f64 = 0.1;

/// How often the scheduling thread wakes up to top up the lookahead
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Thread-safe f32 parameter using atomic operations.
/// Converts f32 to u32 bits for atomic storage; clones share the value.
#[derive(Clone)]
pub struct AtomicF32 {
    inner: Arc<AtomicU32>,
}

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self {
            inner: Arc::new(AtomicU32::new(value.to_bits())),
        }
    }

    /// Set the value (called from the control thread)
    pub fn set(&self, value: f32) {
        self.inner.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Get the value (called from the scheduling thread)
    pub fn get(&self) -> f32 {
        f32::from_bits(self.inner.load(Ordering::Relaxed))
    }
}

impl Default for AtomicF32 {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Source of "now" on the audio clock, in seconds.
///
/// Production uses [`MonotonicClock`]; tests drive time by hand.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> f64;
}

/// Monotonic wall-clock time source anchored at construction
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// One scheduled subdivision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Running tick counter since the transport started
    pub index: u64,
    /// Intended audible time, swing already applied
    pub time: f64,
}

/// Pure lookahead math: which ticks fall before a horizon.
///
/// Tempo and swing are sampled per tick; changing them takes effect on
/// the very next scheduled tick, no stop/start needed.
#[derive(Debug)]
pub struct TickScheduler {
    next_time: f64,
    index: u64,
}

impl TickScheduler {
    pub fn new(start_time: f64) -> Self {
        Self {
            next_time: start_time,
            index: 0,
        }
    }

    /// Duration of one 16th note at the given tempo
    pub fn step_interval(bpm: f32) -> f64 {
        60.0 / bpm as f64 / 4.0
    }

    /// All ticks due strictly before `horizon`.
    ///
    /// Odd ticks are delayed by `swing * interval / 3` (a full triplet
    /// shift at `swing = 1.0`); the underlying grid stays unswung so
    /// `swing = 0` is sample-exact.
    pub fn due_ticks(&mut self, horizon: f64, bpm: f32, swing: f32) -> Vec<Tick> {
        let mut due = Vec::new();
        while self.next_time < horizon {
            let interval = Self::step_interval(bpm);
            let mut time = self.next_time;
            if self.index % 2 == 1 {
                time += swing as f64 * interval / 3.0;
            }
            due.push(Tick {
                index: self.index,
                time,
            });
            self.index += 1;
            self.next_time += interval;
        }
        due
    }
}

/// Fixed-interval 16th-note scheduler driving a tick callback.
///
/// `start` while already started stops and restarts cleanly; `stop`
/// when stopped is a no-op. Tempo and swing update live.
pub struct TransportClock {
    tempo: AtomicF32,
    swing: AtomicF32,
    running: Arc<AtomicBool>,
    time: Arc<dyn TimeSource>,
    handle: Option<JoinHandle<()>>,
}

impl TransportClock {
    pub fn new() -> Self {
        Self::with_time_source(Arc::new(MonotonicClock::new()))
    }

    pub fn with_time_source(time: Arc<dyn TimeSource>) -> Self {
        Self {
            tempo: AtomicF32::new(120.0),
            swing: AtomicF32::new(0.0),
            running: Arc::new(AtomicBool::new(false)),
            time,
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Update tempo live; the next scheduled tick uses it
    pub fn set_tempo(&self, bpm: u16) {
        self.tempo.set(bpm as f32);
    }

    /// Update swing live, clamped to [0, 1]
    pub fn set_swing(&self, swing: f32) {
        self.swing.set(swing.clamp(0.0, 1.0));
    }

    /// Begin the periodic schedule, restarting if already running.
    ///
    /// `on_tick` receives the intended audible time of each 16th.
    pub fn start(&mut self, bpm: u16, swing: f32, mut on_tick: impl FnMut(f64) + Send + 'static) {
        self.stop();

        self.tempo.set(bpm as f32);
        self.swing.set(swing.clamp(0.0, 1.0));
        self.running.store(true, Ordering::Relaxed);

        let running = Arc::clone(&self.running);
        let tempo = self.tempo.clone();
        let swing = self.swing.clone();
        let time = Arc::clone(&self.time);

        self.handle = Some(std::thread::spawn(move || {
            let mut scheduler = TickScheduler::new(time.now());
            while running.load(Ordering::Relaxed) {
                let horizon = time.now() + LOOKAHEAD_SECONDS;
                for tick in scheduler.due_ticks(horizon, tempo.get(), swing.get()) {
                    on_tick(tick.time);
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        }));

        info!("transport started at {bpm} BPM");
    }

    /// Halt scheduling and drop pending ticks; safe when not started
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
            info!("transport stopped");
        }
    }
}

impl Drop for TransportClock {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::mpsc;

    #[test]
    fn test_atomic_f32_round_trip() {
        let value = AtomicF32::new(1.5);
        assert_eq!(value.get(), 1.5);

        let shared = value.clone();
        shared.set(-0.25);
        assert_eq!(value.get(), -0.25);
    }

    #[test]
    fn test_step_interval_at_reference_tempos() {
        assert!((TickScheduler::step_interval(120.0) - 0.125).abs() < 1e-12);
        assert!((TickScheduler::step_interval(60.0) - 0.25).abs() < 1e-12);
        assert!((TickScheduler::step_interval(240.0) - 0.0625).abs() < 1e-12);
    }

    #[test]
    fn test_due_ticks_fill_the_horizon() {
        let mut scheduler = TickScheduler::new(0.0);
        let ticks = scheduler.due_ticks(0.5, 120.0, 0.0);

        // 0.0, 0.125, 0.25, 0.375 are due; 0.5 is not (strictly before)
        assert_eq!(ticks.len(), 4);
        assert_eq!(ticks[0], Tick { index: 0, time: 0.0 });
        assert_eq!(ticks[3], Tick { index: 3, time: 0.375 });

        // Nothing more until the horizon moves
        assert!(scheduler.due_ticks(0.5, 120.0, 0.0).is_empty());
        assert_eq!(scheduler.due_ticks(0.6, 120.0, 0.0).len(), 1);
        // 0.625 is strictly before 0.626, so it is due too
        assert_eq!(scheduler.due_ticks(0.626, 120.0, 0.0).len(), 1);
    }

    #[test]
    fn test_swing_delays_odd_ticks_only() {
        let mut scheduler = TickScheduler::new(0.0);
        let ticks = scheduler.due_ticks(0.5, 120.0, 1.0);

        let interval = 0.125;
        assert_eq!(ticks[0].time, 0.0);
        assert!((ticks[1].time - (interval + interval / 3.0)).abs() < 1e-12);
        assert_eq!(ticks[2].time, 0.25);
        assert!((ticks[3].time - (0.375 + interval / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn test_half_swing_scales_the_shift() {
        let mut scheduler = TickScheduler::new(0.0);
        let ticks = scheduler.due_ticks(0.3, 120.0, 0.5);
        assert!((ticks[1].time - (0.125 + 0.5 * 0.125 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn test_tempo_change_applies_to_next_tick() {
        let mut scheduler = TickScheduler::new(0.0);
        // One tick at 120 BPM
        let first = scheduler.due_ticks(0.01, 120.0, 0.0);
        assert_eq!(first.len(), 1);

        // Tempo doubled: the following grid uses the new interval
        let rest = scheduler.due_ticks(0.2, 240.0, 0.0);
        assert_eq!(rest[0].time, 0.125);
        assert!((rest[1].time - 0.1875).abs() < 1e-12);
    }

    struct ManualTime {
        now: Mutex<f64>,
    }

    impl TimeSource for ManualTime {
        fn now(&self) -> f64 {
            *self.now.lock().unwrap()
        }
    }

    #[test]
    fn test_transport_clock_fires_and_stops() {
        let time = Arc::new(ManualTime {
            now: Mutex::new(0.0),
        });
        let mut clock = TransportClock::with_time_source(time);
        let (tx, rx) = mpsc::channel();

        clock.start(120, 0.0, move |t| {
            tx.send(t).ok();
        });
        assert!(clock.is_running());

        // With time frozen at 0.0 the lookahead covers exactly one tick
        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first, 0.0);

        clock.stop();
        assert!(!clock.is_running());
        // Stop again is a no-op
        clock.stop();
    }
}
