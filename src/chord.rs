//! # Chord Classifier
//!
//! Reduces the set of pitches sounding at one beat to scale degrees and
//! names a Roman-numeral chord.
//!
//! ## Algorithm
//! 1. Reduce pitches to unique pitch classes (octave doublings collapse).
//! 2. Transpose each pitch class into the analysis key
//!    (`(pc - tonic) mod 12`) and keep only the seven diatonic offsets
//!    {0, 2, 4, 5, 7, 9, 11}, mapped to degrees 1-7. Chromatic passing
//!    tones are silently dropped from the degree set.
//! 3. Classify the degree set: exact triad match first, then the incomplete
//!    dyads common in shape-note writing, then single notes, then a
//!    min-degree fallback for anything more complex.
//!
//! Triad and dyad readings are fixed root-position interpretations and do
//! not consult the mode; only the single-note and fallback paths do. The
//! fallback treats the minimum degree as the root, which is not necessarily
//! the sounding bass: inverted voicings can misclassify. The style tables
//! in `rules` are calibrated against exactly these readings.
//!
//! ## Related Modules
//! - `rules` - assesses the Roman numerals produced here
//! - `analyzer` - drives classification per beat sample

use crate::score::{Key, Mode};

/// Diatonic semitone offsets from the tonic, indexed to degrees 1-7.
const DIATONIC_OFFSETS: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];

/// Roman numerals by scale degree in a major key.
const MAJOR_ROMAN: [&str; 7] = ["I", "ii", "iii", "IV", "V", "vi", "vii°"];

/// Roman numerals by scale degree in natural minor.
const MINOR_ROMAN: [&str; 7] = ["i", "ii°", "III", "iv", "v", "VI", "VII"];

/// Outcome of classifying the pitches at one beat.
#[derive(Debug, Clone, PartialEq)]
pub enum ChordClass {
    /// No pitches sounding at this beat.
    Silence,
    /// Pitches sounding, but none of them diatonic: nothing to name.
    Unknown { pitch_classes: Vec<u8> },
    /// A named chord with the degrees that produced it.
    Classified {
        roman: &'static str,
        degrees: Vec<u8>,
    },
}

impl ChordClass {
    /// The Roman numeral, if one was assigned.
    pub fn roman(&self) -> Option<&'static str> {
        match self {
            ChordClass::Classified { roman, .. } => Some(roman),
            _ => None,
        }
    }

    /// The sorted degree set ([] for silence and unknown chords).
    pub fn degrees(&self) -> &[u8] {
        match self {
            ChordClass::Classified { degrees, .. } => degrees,
            _ => &[],
        }
    }
}

/// Map sounding pitches to the sorted unique scale-degree set for `key`.
pub fn scale_degrees(pitches: &[u8], key: &Key) -> Vec<u8> {
    let mut degrees: Vec<u8> = pitches
        .iter()
        .filter_map(|&midi| {
            let transposed = (i16::from(midi % 12) - i16::from(key.tonic_pc)).rem_euclid(12) as u8;
            DIATONIC_OFFSETS
                .iter()
                .position(|&offset| offset == transposed)
                .map(|idx| idx as u8 + 1)
        })
        .collect();
    degrees.sort_unstable();
    degrees.dedup();
    degrees
}

/// Classify the pitches sounding at one beat.
///
/// Deterministic and independent of octave and input ordering: only the
/// pitch-class set matters.
///
/// # Example
/// ```
/// use fasola::chord::classify;
/// use fasola::score::Key;
///
/// // C-E-G in C major is the tonic triad, however it is voiced.
/// let class = classify(&[60, 64, 67, 72], &Key::default());
/// assert_eq!(class.roman(), Some("I"));
/// assert_eq!(class.degrees(), &[1, 3, 5]);
/// ```
pub fn classify(pitches: &[u8], key: &Key) -> ChordClass {
    if pitches.is_empty() {
        return ChordClass::Silence;
    }

    let degrees = scale_degrees(pitches, key);
    if degrees.is_empty() {
        let mut pitch_classes: Vec<u8> = pitches.iter().map(|p| p % 12).collect();
        pitch_classes.sort_unstable();
        pitch_classes.dedup();
        return ChordClass::Unknown { pitch_classes };
    }

    let roman = name_degrees(&degrees, key.mode);
    ChordClass::Classified { roman, degrees }
}

/// Name a sorted unique degree set.
///
/// Exact triads first, then the incomplete dyads, then single notes, then
/// the min-degree fallback.
fn name_degrees(degrees: &[u8], mode: Mode) -> &'static str {
    match degrees {
        // Complete triads, root-position readings.
        [1, 3, 5] => "I",
        [1, 3, 6] => "vi",
        [2, 5, 7] => "V",
        [1, 4, 6] => "IV",
        [2, 4, 6] => "ii",
        [3, 5, 7] => "iii",
        [2, 4, 7] => "vii°",

        // Incomplete dyads.
        [1, 5] | [1, 3] => "I",
        [3, 6] => "vi",
        [5, 7] | [2, 5] => "V",

        // Single note: assume it is a chord root.
        [degree] => roman_for_degree(*degree, mode),

        // Complex or ambiguous set: treat the minimum degree as the root.
        _ => roman_for_degree(degrees[0], mode),
    }
}

/// Genre Roman numeral for a bare scale degree in the given mode.
pub fn roman_for_degree(degree: u8, mode: Mode) -> &'static str {
    debug_assert!((1..=7).contains(&degree));
    let idx = usize::from(degree - 1) % 7;
    match mode {
        Mode::Major => MAJOR_ROMAN[idx],
        Mode::Minor => MINOR_ROMAN[idx],
    }
}
