//! Integration tests for the fasola analyzer
//!
//! Tests the full pipeline from a MIDI file on disk to harmony log content.

use std::fs;
use std::path::Path;

use midly::{
    num::{u15, u24, u28, u4, u7},
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
};

use fasola::{decode_file, AnalyzeError, Analyzer, MemorySink};

const TPQ: u16 = 480;

/// Write a four-voice, four-beat SMF: I, vii°, vi, I over the given bass line.
fn write_score(path: &Path, bass: [u8; 4]) {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TPQ)),
    ));

    let mut conductor: Track<'_> = Vec::new();
    conductor.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(500_000))),
    });
    conductor.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TimeSignature(4, 2, 24, 8)),
    });
    conductor.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    smf.tracks.push(conductor);

    let voices: [[u8; 4]; 4] = [
        [72, 71, 72, 72], // treble: C5 B4 C5 C5
        [67, 74, 69, 67], // alto:   G4 D5 A4 G4
        [64, 77, 64, 64], // tenor:  E4 F5 E4 E4
        bass,
    ];
    for (channel, line) in voices.iter().enumerate() {
        let mut track: Track<'_> = Vec::new();
        for &pitch in line {
            track.push(TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Midi {
                    channel: u4::new(channel as u8),
                    message: MidiMessage::NoteOn {
                        key: u7::new(pitch),
                        vel: u7::new(80),
                    },
                },
            });
            track.push(TrackEvent {
                delta: u28::new(TPQ.into()),
                kind: TrackEventKind::Midi {
                    channel: u4::new(channel as u8),
                    message: MidiMessage::NoteOff {
                        key: u7::new(pitch),
                        vel: u7::new(0),
                    },
                },
            });
        }
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        smf.tracks.push(track);
    }

    let mut bytes = Vec::new();
    smf.write(&mut bytes).unwrap();
    fs::write(path, bytes).unwrap();
}

const NOTATION_SOURCE: &str = "\
\\transpose do la {
  \\key do \\major

  trebleA = \\relative do'' {
    do4 si do do |
  }

  bassA = \\relative do {
    do4 re la mi |
  }
}
";

#[test]
fn test_full_run_writes_timestamped_log() {
    let dir = tempfile::tempdir().unwrap();
    let midi_path = dir.path().join("tune.mid");
    let log_path = dir.path().join("harmony.log");
    write_score(&midi_path, [48, 50, 45, 43]);

    fasola::run_analysis(&midi_path, &log_path, None).unwrap();

    let log = fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("=== SACRED HARP HARMONIC ANALYSIS START ==="));
    assert!(log.contains("=== SACRED HARP HARMONIC ANALYSIS END ==="));
    assert!(log.contains("in C major, 4/4 time"));

    // The forbidden chord is logged with its fix suggestion; the fine
    // chords around it stay out of the line-by-line log.
    assert!(log.contains("Bar 1, Beat 2: vii° (2-4-7) - FORBIDDEN"));
    assert!(log.contains("→ Fix suggestion: Replace with V chord (sol-si-re)"));
    assert!(!log.contains("excellent choice"));

    // Bass G2 on the final beat touches the critical floor.
    assert!(log.contains(
        "VOICE LEADING WARNING: Bar 1, Beat 4: CRITICAL: Bass note G2 (MIDI 43, Analysis: 43)"
    ));

    assert!(log.contains("PROGRESSION: I - vii° - vi - I"));
    assert!(log.contains("ERROR: Forbidden vii° chord found in progression"));

    // Every entry line is timestamped "<timestamp>: <message>".
    let banner_line = log
        .lines()
        .find(|l| l.contains("ANALYSIS START"))
        .unwrap();
    let (timestamp, _) = banner_line.split_once(": ").unwrap();
    assert_eq!(timestamp.len(), "2026-01-01 00:00:00".len());
}

#[test]
fn test_missing_score_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("harmony.log");

    let result = fasola::run_analysis(&dir.path().join("absent.mid"), &log_path, None);
    assert!(matches!(result, Err(AnalyzeError::Decode(_))));

    let log = fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("ERROR: Could not load MIDI file:"));
    assert!(!log.contains("ANALYSIS END"));
}

#[test]
fn test_notation_source_adds_locations_and_transposition() {
    let dir = tempfile::tempdir().unwrap();
    let midi_path = dir.path().join("tune.mid");
    let log_path = dir.path().join("harmony.log");
    let notation_path = dir.path().join("tune.ly");
    // Bass E2 on beat 1: written pitch G2 after the +3 analysis offset.
    write_score(&midi_path, [40, 48, 50, 48]);
    fs::write(&notation_path, NOTATION_SOURCE).unwrap();

    fasola::run_analysis(&midi_path, &log_path, Some(&notation_path)).unwrap();

    let log = fs::read_to_string(&log_path).unwrap();
    assert!(log.contains(
        "Detected transposition: \\transpose do la (LilyPond: -3 semitones, Analysis: +3 semitones)"
    ));
    assert!(log.contains("CRITICAL: Bass note E2 (MIDI 40, Analysis: 43)"));
    assert!(log.contains("→ Location: bassA section, approximately line"));
    assert!(log.contains("→ Context:"));
    assert!(log.contains("→ Fix suggestion: Change note to higher octave"));
}

#[test]
fn test_unreadable_notation_degrades_gracefully() {
    let dir = tempfile::tempdir().unwrap();
    let midi_path = dir.path().join("tune.mid");
    let log_path = dir.path().join("harmony.log");
    write_score(&midi_path, [48, 50, 45, 43]);

    let missing = dir.path().join("missing.ly");
    fasola::run_analysis(&midi_path, &log_path, Some(&missing)).unwrap();

    let log = fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("WARNING: Could not parse LilyPond file"));
    // Core findings are unaffected, only location blocks disappear.
    assert!(log.contains("Bar 1, Beat 2: vii° (2-4-7) - FORBIDDEN"));
    assert!(!log.contains("→ Location:"));
}

#[test]
fn test_reruns_produce_identical_findings() {
    let dir = tempfile::tempdir().unwrap();
    let midi_path = dir.path().join("tune.mid");
    write_score(&midi_path, [48, 50, 45, 43]);

    let decoded = decode_file(&midi_path).unwrap();

    let mut first = MemorySink::new();
    Analyzer::new(&mut first)
        .analyze_score(&decoded.score, "tune.mid")
        .unwrap();
    let mut second = MemorySink::new();
    Analyzer::new(&mut second)
        .analyze_score(&decoded.score, "tune.mid")
        .unwrap();

    assert_eq!(first.messages, second.messages);
    assert!(!first.messages.is_empty());
}
