//! # Score Decoder
//!
//! Turns a Standard MIDI File into the immutable Score Model.
//!
//! Uses the `midly` crate for SMF parsing. Tracks that contain note events
//! become voice parts in file order, which for LilyPond-rendered hymn MIDI
//! is the SATB order the rest of the analyzer assumes. Offsets and
//! durations are ticks divided by the file's ticks-per-quarter, so the
//! Score Model speaks quarter-note units throughout.
//!
//! Key and meter detection are recoverable: when either fails the decoder
//! falls back to the documented defaults (C major, 4/4) and returns a
//! warning string for the harmony log instead of an error. Only unreadable
//! or malformed files, and SMPTE-timed files with no beat grid, are fatal.
//!
//! Key detection is Krumhansl-Schmuckler profile correlation over a
//! duration-weighted pitch-class histogram.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::debug;
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

use crate::error::DecodeError;
use crate::score::{Key, Meter, Mode, Part, PitchEvent, Score};

/// A decoded score plus the warnings produced by recoverable detection
/// failures. The orchestrator writes each warning to the harmony log.
#[derive(Debug)]
pub struct Decoded {
    pub score: Score,
    pub warnings: Vec<String>,
}

/// Decode a MIDI file from disk.
pub fn decode_file(path: &Path) -> Result<Decoded, DecodeError> {
    let bytes = fs::read(path).map_err(|source| DecodeError::Read {
        path: path.display().to_string(),
        source,
    })?;
    decode_bytes(&bytes)
}

/// Decode an in-memory Standard MIDI File.
pub fn decode_bytes(bytes: &[u8]) -> Result<Decoded, DecodeError> {
    let smf = Smf::parse(bytes)?;
    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(tpq) => f64::from(tpq.as_int()),
        Timing::Timecode(..) => return Err(DecodeError::SmpteTiming),
    };

    let mut warnings = Vec::new();
    let mut time_signature: Option<(u8, u8)> = None;
    let mut parts = Vec::new();

    for track in &smf.tracks {
        let mut tick = 0u64;
        let mut active: HashMap<u8, u64> = HashMap::new();
        let mut events = Vec::new();

        for event in track {
            tick += u64::from(event.delta.as_int());
            match &event.kind {
                TrackEventKind::Midi { message, .. } => match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        // A second note-on for a sounding key keeps the
                        // first start; the eventual note-off closes it.
                        active.entry(key.as_int()).or_insert(tick);
                    }
                    MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                        if let Some(start) = active.remove(&key.as_int()) {
                            events.push(tick_event(key.as_int(), start, tick, ticks_per_quarter));
                        }
                    }
                    _ => {}
                },
                TrackEventKind::Meta(MetaMessage::TimeSignature(num, denom_pow, _, _)) => {
                    if time_signature.is_none() && *denom_pow < 8 {
                        time_signature = Some((*num, 1u8 << *denom_pow));
                    }
                }
                _ => {}
            }
        }

        // Close notes left sounding at end of track.
        for (key, start) in active {
            events.push(tick_event(key, start, tick, ticks_per_quarter));
        }

        if !events.is_empty() {
            events.sort_by(|a, b| {
                a.offset
                    .partial_cmp(&b.offset)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.midi.cmp(&b.midi))
            });
            parts.push(Part { events });
        }
    }

    let meter = match time_signature {
        Some((num, denom)) => Meter::from_signature(num, denom),
        None => {
            warnings.push(
                "WARNING: No time signature found in MIDI file; assuming 4/4".to_string(),
            );
            Meter::default()
        }
    };

    let key = match detect_key(&parts) {
        Some(key) => key,
        None => {
            warnings.push(
                "WARNING: Key detection failed; assuming C major (Sacred Harp solmization default)"
                    .to_string(),
            );
            Key::default()
        }
    };

    debug!(
        "decoded {} parts, key {} {}, meter {}/{}",
        parts.len(),
        key.tonic_name(),
        key.mode,
        meter.numerator,
        meter.denominator
    );

    Ok(Decoded {
        score: Score { parts, key, meter },
        warnings,
    })
}

fn tick_event(midi: u8, start: u64, end: u64, ticks_per_quarter: f64) -> PitchEvent {
    PitchEvent {
        midi,
        offset: start as f64 / ticks_per_quarter,
        duration: (end.saturating_sub(start)) as f64 / ticks_per_quarter,
    }
}

/// Krumhansl-Kessler major key profile (probe-tone ratings).
const MAJOR_PROFILE: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Krumhansl-Kessler minor key profile.
const MINOR_PROFILE: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// Detect the key by correlating a duration-weighted pitch-class histogram
/// against the major and minor profiles over all 24 candidates.
///
/// Returns `None` when the score carries no pitched content to correlate.
fn detect_key(parts: &[Part]) -> Option<Key> {
    let mut histogram = [0.0f64; 12];
    for part in parts {
        for event in &part.events {
            histogram[usize::from(event.midi % 12)] += event.duration;
        }
    }
    if histogram.iter().sum::<f64>() <= 0.0 {
        return None;
    }

    let mut best: Option<(f64, Key)> = None;
    for tonic_pc in 0..12u8 {
        let rotated: Vec<f64> = (0..12)
            .map(|degree| histogram[usize::from((tonic_pc + degree) % 12)])
            .collect();
        for (mode, profile) in [(Mode::Major, &MAJOR_PROFILE), (Mode::Minor, &MINOR_PROFILE)] {
            let score = correlation(&rotated, profile);
            if best.map_or(true, |(b, _)| score > b) {
                best = Some((score, Key { tonic_pc, mode }));
            }
        }
    }
    best.map(|(_, key)| key)
}

/// Pearson correlation between two equal-length samples.
fn correlation(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let mut num = 0.0;
    let mut den_x = 0.0;
    let mut den_y = 0.0;
    for (&x, &y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        num += dx * dy;
        den_x += dx * dx;
        den_y += dy * dy;
    }
    let denom = (den_x * den_y).sqrt();
    if denom == 0.0 {
        0.0
    } else {
        num / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::{
        num::{u15, u24, u28, u4, u7},
        Format, Header, Track, TrackEvent,
    };

    const TPQ: u16 = 480;

    fn note(track: &mut Track<'_>, channel: u8, key: u8, delta_on: u32, length: u32) {
        track.push(TrackEvent {
            delta: u28::new(delta_on),
            kind: TrackEventKind::Midi {
                channel: u4::new(channel),
                message: MidiMessage::NoteOn {
                    key: u7::new(key),
                    vel: u7::new(80),
                },
            },
        });
        track.push(TrackEvent {
            delta: u28::new(length),
            kind: TrackEventKind::Midi {
                channel: u4::new(channel),
                message: MidiMessage::NoteOff {
                    key: u7::new(key),
                    vel: u7::new(0),
                },
            },
        });
    }

    fn four_voice_smf(time_signature: Option<(u8, u8)>) -> Vec<u8> {
        let mut smf = Smf::new(Header::new(
            Format::Parallel,
            Timing::Metrical(u15::new(TPQ)),
        ));

        // Conductor track: tempo plus optional time signature, no notes.
        let mut conductor: Track<'_> = Vec::new();
        conductor.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(500_000))),
        });
        if let Some((num, denom)) = time_signature {
            let denom_pow = denom.trailing_zeros() as u8;
            conductor.push(TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::TimeSignature(num, denom_pow, 24, 8)),
            });
        }
        conductor.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        smf.tracks.push(conductor);

        // One track per voice, two quarter notes each (C major material).
        for (channel, (first, second)) in
            [(72, 71), (67, 65), (64, 62), (48, 43)].into_iter().enumerate()
        {
            let mut track: Track<'_> = Vec::new();
            note(&mut track, channel as u8, first, 0, TPQ.into());
            note(&mut track, channel as u8, second, 0, TPQ.into());
            track.push(TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
            });
            smf.tracks.push(track);
        }

        let mut bytes = Vec::new();
        smf.write(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_decode_four_voice_file() {
        let bytes = four_voice_smf(Some((3, 4)));
        let decoded = decode_bytes(&bytes).unwrap();

        // The conductor track holds no notes and becomes no part.
        assert_eq!(decoded.score.parts.len(), 4);
        assert!(decoded.warnings.is_empty());

        let treble = &decoded.score.parts[0];
        assert_eq!(treble.events.len(), 2);
        assert_eq!(treble.events[0].midi, 72);
        assert_eq!(treble.events[0].offset, 0.0);
        assert_eq!(treble.events[0].duration, 1.0);
        assert_eq!(treble.events[1].offset, 1.0);

        assert_eq!(decoded.score.meter.numerator, 3);
        assert_eq!(decoded.score.meter.denominator, 4);
        assert_eq!(decoded.score.total_duration(), 2.0);
    }

    #[test]
    fn test_missing_time_signature_defaults_with_warning() {
        let bytes = four_voice_smf(None);
        let decoded = decode_bytes(&bytes).unwrap();
        assert_eq!(decoded.score.meter, Meter::default());
        assert!(decoded
            .warnings
            .iter()
            .any(|w| w.contains("assuming 4/4")));
    }

    #[test]
    fn test_key_detection_prefers_c_major_material() {
        let bytes = four_voice_smf(Some((4, 4)));
        let decoded = decode_bytes(&bytes).unwrap();
        // C-E-G-B-D-F content correlates with C major.
        assert_eq!(decoded.score.key.tonic_pc, 0);
        assert_eq!(decoded.score.key.mode, Mode::Major);
    }

    #[test]
    fn test_empty_file_defaults_key_with_warning() {
        let mut smf = Smf::new(Header::new(
            Format::SingleTrack,
            Timing::Metrical(u15::new(TPQ)),
        ));
        let mut track: Track<'_> = Vec::new();
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        smf.tracks.push(track);
        let mut bytes = Vec::new();
        smf.write(&mut bytes).unwrap();

        let decoded = decode_bytes(&bytes).unwrap();
        assert!(decoded.score.parts.is_empty());
        assert_eq!(decoded.score.key, Key::default());
        assert!(decoded
            .warnings
            .iter()
            .any(|w| w.contains("Key detection failed")));
    }

    #[test]
    fn test_garbage_bytes_are_malformed() {
        assert!(matches!(
            decode_bytes(b"not a midi file"),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_detect_key_on_a_minor_profile() {
        // Weight the histogram like an A natural-minor tune with a heavy
        // tonic: A E A C E A.
        let parts = vec![Part {
            events: [57u8, 64, 69, 60, 76, 81]
                .iter()
                .enumerate()
                .map(|(i, &midi)| PitchEvent {
                    midi,
                    offset: i as f64,
                    duration: if midi % 12 == 9 { 2.0 } else { 1.0 },
                })
                .collect(),
        }];
        let key = detect_key(&parts).unwrap();
        assert_eq!(key.tonic_pc, 9);
        assert_eq!(key.mode, Mode::Minor);
    }
}
