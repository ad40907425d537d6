//! # Score Model
//!
//! Immutable view over decoded musical data: per-voice timed pitch events,
//! detected key and mode, detected meter, and the beat grid derived from it.
//!
//! ## Type Hierarchy
//! ```text
//! Score
//!   ├── Vec<Part>           (decoder order; first four are treble/alto/tenor/bass)
//!   │     └── Vec<PitchEvent> (midi, offset, duration in quarter-note units)
//!   ├── Key (tonic pitch class + mode)
//!   └── Meter (signature + derived beats-per-measure / beat-duration)
//! ```
//!
//! ## Time Units
//! All offsets and durations are in quarter-note units, matching the
//! decoder's tick / ticks-per-quarter division. The beat grid steps by
//! `Meter::beat_duration`, which is 1.0 in 4/4, 2.0 in a /2 signature, and
//! 1.5 (dotted quarter) in compound /8 signatures.
//!
//! ## Related Modules
//! - `decode` - builds a Score from a Standard MIDI File
//! - `chord` - classifies the pitch sets this model exposes per beat
//! - `ranges`, `leading` - consume the per-voice snapshots

use std::fmt;

/// Half-beat window used when gathering the pitches sounding "at" a beat.
pub const BEAT_WINDOW: f64 = 0.5;

/// The four shape-note voice parts, in the decoder's part order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    Treble,
    Alto,
    Tenor,
    Bass,
}

impl Voice {
    pub const ALL: [Voice; 4] = [Voice::Treble, Voice::Alto, Voice::Tenor, Voice::Bass];

    /// Part index in the decoder's SATB ordering.
    pub fn index(self) -> usize {
        match self {
            Voice::Treble => 0,
            Voice::Alto => 1,
            Voice::Tenor => 2,
            Voice::Bass => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Voice::Treble => "treble",
            Voice::Alto => "alto",
            Voice::Tenor => "tenor",
            Voice::Bass => "bass",
        }
    }

    /// Capitalized name for log messages ("Treble", "Bass").
    pub fn title(self) -> &'static str {
        match self {
            Voice::Treble => "Treble",
            Voice::Alto => "Alto",
            Voice::Tenor => "Tenor",
            Voice::Bass => "Bass",
        }
    }

    /// Parse a lowercase voice name as it appears in notation sources.
    pub fn from_name(name: &str) -> Option<Voice> {
        match name {
            "treble" => Some(Voice::Treble),
            "alto" => Some(Voice::Alto),
            "tenor" => Some(Voice::Tenor),
            "bass" => Some(Voice::Bass),
            _ => None,
        }
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Major or natural minor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Major,
    Minor,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Major => f.write_str("major"),
            Mode::Minor => f.write_str("minor"),
        }
    }
}

/// Analysis key: tonic pitch class (0 = C) and mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key {
    pub tonic_pc: u8,
    pub mode: Mode,
}

impl Default for Key {
    /// C major, the Sacred Harp solmization default.
    fn default() -> Self {
        Key {
            tonic_pc: 0,
            mode: Mode::Major,
        }
    }
}

impl Key {
    /// Tonic spelled with sharps ("C", "F#", ...).
    pub fn tonic_name(&self) -> &'static str {
        NOTE_NAMES[usize::from(self.tonic_pc % 12)]
    }
}

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Spell a MIDI note with octave ("G2", "C5"). Octave numbering follows the
/// MIDI convention where middle C (60) is C4.
pub fn pitch_name(midi: u8) -> String {
    let name = NOTE_NAMES[usize::from(midi % 12)];
    let octave = i16::from(midi / 12) - 1;
    format!("{name}{octave}")
}

/// One sounding note inside a voice part.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEvent {
    pub midi: u8,
    /// Start offset in quarter-note units from the beginning of the piece.
    pub offset: f64,
    /// Duration in quarter-note units.
    pub duration: f64,
}

impl PitchEvent {
    /// Whether this event sounds anywhere inside `[offset, offset + BEAT_WINDOW)`.
    ///
    /// An event that ends exactly at `offset` does not count as sounding.
    fn overlaps(&self, offset: f64) -> bool {
        self.offset < offset + BEAT_WINDOW && self.offset + self.duration > offset
    }
}

/// One voice part: pitch events ordered by start offset.
#[derive(Debug, Clone, Default)]
pub struct Part {
    pub events: Vec<PitchEvent>,
}

/// Detected time signature plus the derived analysis beat grid.
///
/// Compound /8 signatures with 6, 9 or 12 beats are reinterpreted as
/// dotted-quarter beats: 6/8 becomes 2 beats of 1.5 quarter-notes each.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Meter {
    pub numerator: u8,
    pub denominator: u8,
    pub beats_per_measure: u8,
    pub beat_duration: f64,
}

impl Default for Meter {
    fn default() -> Self {
        Meter::from_signature(4, 4)
    }
}

impl Meter {
    /// Derive the analysis beat grid from a raw time signature.
    ///
    /// # Example
    /// ```
    /// use fasola::score::Meter;
    ///
    /// let m = Meter::from_signature(6, 8);
    /// assert_eq!(m.beats_per_measure, 2);
    /// assert_eq!(m.beat_duration, 1.5);
    /// ```
    pub fn from_signature(numerator: u8, denominator: u8) -> Meter {
        let mut beats_per_measure = numerator;
        let beat_duration = match denominator {
            4 => 1.0,
            2 => 2.0,
            8 => {
                if matches!(numerator, 6 | 9 | 12) {
                    beats_per_measure = numerator / 3;
                    1.5
                } else {
                    0.5
                }
            }
            other => 4.0 / f64::from(other),
        };
        Meter {
            numerator,
            denominator,
            beats_per_measure,
            beat_duration,
        }
    }
}

/// One slot of the analysis beat grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatSample {
    /// 1-based measure number.
    pub measure: u32,
    /// 1-based beat within the measure.
    pub beat: u32,
    /// Offset in quarter-note units.
    pub offset: f64,
}

/// Immutable decoded score. Built once by the decoder, read-only thereafter.
#[derive(Debug, Clone)]
pub struct Score {
    pub parts: Vec<Part>,
    pub key: Key,
    pub meter: Meter,
}

impl Score {
    /// Highest event end offset across all parts, in quarter-note units.
    pub fn total_duration(&self) -> f64 {
        self.parts
            .iter()
            .flat_map(|p| p.events.iter())
            .map(|e| e.offset + e.duration)
            .fold(0.0, f64::max)
    }

    /// The full beat grid from offset 0 to the total duration.
    ///
    /// Beat numbering resets to 1 and the measure increments every
    /// `beats_per_measure` beats, tracking the detected meter exactly.
    pub fn beat_samples(&self) -> Vec<BeatSample> {
        let total = self.total_duration();
        let mut samples = Vec::new();
        let mut offset = 0.0;
        let mut measure = 1u32;
        let mut beat = 1u32;
        while offset < total {
            samples.push(BeatSample {
                measure,
                beat,
                offset,
            });
            offset += self.meter.beat_duration;
            beat += 1;
            if beat > u32::from(self.meter.beats_per_measure) {
                beat = 1;
                measure += 1;
            }
        }
        samples
    }

    /// Every pitch sounding during the half-beat window at `offset`, across
    /// all parts, duplicates and octave doublings included.
    pub fn pitches_at(&self, offset: f64) -> Vec<u8> {
        let mut pitches = Vec::new();
        for part in &self.parts {
            for event in &part.events {
                if event.overlaps(offset) {
                    pitches.push(event.midi);
                }
            }
        }
        pitches
    }

    /// At most one sounding pitch per voice at `offset`: the first event
    /// found in that part overlapping the window. Simultaneous pitches within
    /// one part beyond the first are ignored here (chord classification sees
    /// them all via [`Score::pitches_at`]).
    pub fn voice_snapshot(&self, offset: f64) -> [Option<u8>; 4] {
        let mut snapshot = [None; 4];
        for voice in Voice::ALL {
            if let Some(part) = self.parts.get(voice.index()) {
                snapshot[voice.index()] = part
                    .events
                    .iter()
                    .find(|e| e.overlaps(offset))
                    .map(|e| e.midi);
            }
        }
        snapshot
    }
}
