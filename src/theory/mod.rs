// Musical mapping - scale degrees for bass rows, chords for poly steps

use serde::{Deserialize, Serialize};

/// Convert a MIDI note number to frequency in Hz (A4 = 440)
pub fn midi_to_freq(midi: u8) -> f64 {
    440.0 * 2.0_f64.powf((midi as f64 - 69.0) / 12.0)
}

/// A scale anchored at a MIDI root note.
///
/// Bass pattern rows index scale degrees; degrees past the interval set
/// wrap into the next octave, so an 8-wide row over a pentatonic scale
/// spans a little more than an octave and a half.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scale {
    /// MIDI note of degree 0
    pub root: u8,
    /// Semitone offsets within one octave, ascending, starting at 0
    pub intervals: Vec<u8>,
}

impl Scale {
    pub fn new(root: u8, intervals: Vec<u8>) -> Self {
        assert!(!intervals.is_empty(), "Scale needs at least one interval");
        Self { root, intervals }
    }

    pub fn minor_pentatonic(root: u8) -> Self {
        Self::new(root, vec![0, 3, 5, 7, 10])
    }

    pub fn major(root: u8) -> Self {
        Self::new(root, vec![0, 2, 4, 5, 7, 9, 11])
    }

    pub fn natural_minor(root: u8) -> Self {
        Self::new(root, vec![0, 2, 3, 5, 7, 8, 10])
    }

    /// MIDI note for a scale-degree index (wraps into higher octaves).
    ///
    /// The fields are public and arrive unvalidated from session files,
    /// so an empty interval set degrades to the root instead of
    /// panicking on the clock thread.
    pub fn degree_to_midi(&self, degree: usize) -> u8 {
        let len = self.intervals.len();
        if len == 0 {
            return self.root;
        }
        let octave = (degree / len) as u8;
        let step = self.intervals[degree % len];
        self.root.saturating_add(octave * 12).saturating_add(step)
    }

    /// Frequency in Hz for a scale-degree index
    pub fn degree_to_freq(&self, degree: usize) -> f64 {
        midi_to_freq(self.degree_to_midi(degree))
    }
}

impl Default for Scale {
    /// A minor pentatonic from A2, the playground's stock bass scale
    fn default() -> Self {
        Self::minor_pentatonic(45)
    }
}

/// Chord quality (interval stack above the root)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChordQuality {
    Major,
    Minor,
    Major7,
    Minor7,
    Dominant7,
    Sus4,
}

impl ChordQuality {
    fn intervals(self) -> &'static [u8] {
        match self {
            ChordQuality::Major => &[0, 4, 7],
            ChordQuality::Minor => &[0, 3, 7],
            ChordQuality::Major7 => &[0, 4, 7, 11],
            ChordQuality::Minor7 => &[0, 3, 7, 10],
            ChordQuality::Dominant7 => &[0, 4, 7, 10],
            ChordQuality::Sus4 => &[0, 5, 7],
        }
    }
}

/// One chord in a progression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chord {
    /// MIDI note of the chord root
    pub root: u8,
    pub quality: ChordQuality,
}

impl Chord {
    pub fn new(root: u8, quality: ChordQuality) -> Self {
        Self { root, quality }
    }

    /// MIDI notes of the chord, root first
    pub fn midi_notes(&self) -> Vec<u8> {
        self.quality
            .intervals()
            .iter()
            .map(|i| self.root.saturating_add(*i))
            .collect()
    }

    /// Frequencies of the chord notes in Hz
    pub fn frequencies(&self) -> Vec<f64> {
        self.midi_notes().into_iter().map(midi_to_freq).collect()
    }
}

/// Stock four-chord progression used for new sessions (Am, F, C, G)
pub fn default_progression() -> Vec<Chord> {
    vec![
        Chord::new(57, ChordQuality::Minor),
        Chord::new(53, ChordQuality::Major),
        Chord::new(48, ChordQuality::Major),
        Chord::new(55, ChordQuality::Major),
    ]
}
