//! # Analysis Orchestrator
//!
//! Drives the full pipeline beat by beat: chord extraction and assessment,
//! voice-leading checks, range and fatigue scans, and the final progression
//! analysis, writing findings to the harmony log as they are produced.
//!
//! ## State machine
//! ```text
//! Uninitialized -> Loaded -> Analyzed -> Reported
//!        \-> Failed (decode error; terminal for the run)
//! ```
//! A run that produces no chord observations stays Loaded and returns the
//! distinct [`AnalyzeError::EmptyAnalysis`] failure.
//!
//! Per-run accumulators (fatigue dedup, motion tally) are locals of one
//! `run` call; concurrent embedders get isolation for free by giving each
//! run its own `Analyzer`.

use std::path::Path;

use log::debug;

use crate::chord::{classify, ChordClass};
use crate::decode::decode_file;
use crate::error::AnalyzeError;
use crate::leading::{check_adjacent_degrees, check_voice_crossing, MotionTally};
use crate::notation::NotationSource;
use crate::ranges::{check_immediate, scan_fatigue, FatigueSample, RangeTable, SACRED_HARP_RANGES};
use crate::report::HarmonySink;
use crate::rules::{Assessment, Status, StyleRules, SACRED_HARP_RULES};
use crate::score::{BeatSample, Score, Voice};

/// Orchestrator lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisState {
    Uninitialized,
    Loaded,
    Analyzed,
    Reported,
    Failed,
}

/// One classified beat.
#[derive(Debug, Clone)]
pub struct ChordObservation {
    pub sample: BeatSample,
    pub class: ChordClass,
    pub assessment: Assessment,
}

impl ChordObservation {
    /// Label for the log line: the Roman numeral, or "Unknown".
    fn label(&self) -> &'static str {
        self.class.roman().unwrap_or("Unknown")
    }

    /// The digits shown next to the label: scale degrees for classified
    /// chords, raw pitch classes for unknown ones.
    fn digits(&self) -> String {
        let values: &[u8] = match &self.class {
            ChordClass::Classified { degrees, .. } => degrees,
            ChordClass::Unknown { pitch_classes } => pitch_classes,
            ChordClass::Silence => &[],
        };
        values
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("-")
    }
}

/// The analysis orchestrator. One instance per log sink; one `run` per
/// score decode.
pub struct Analyzer<'a, S: HarmonySink> {
    sink: &'a mut S,
    notation: Option<NotationSource>,
    rules: &'static StyleRules,
    ranges: &'static RangeTable,
    state: AnalysisState,
}

impl<'a, S: HarmonySink> Analyzer<'a, S> {
    pub fn new(sink: &'a mut S) -> Self {
        Analyzer {
            sink,
            notation: None,
            rules: &SACRED_HARP_RULES,
            ranges: &SACRED_HARP_RANGES,
            state: AnalysisState::Uninitialized,
        }
    }

    pub fn state(&self) -> AnalysisState {
        self.state
    }

    /// Attach a notation source for location annotations and transposition.
    ///
    /// Failure degrades gracefully: a warning is logged and the run
    /// proceeds without location annotations.
    pub fn load_notation(&mut self, path: &Path) -> Result<(), AnalyzeError> {
        match NotationSource::load(path) {
            Ok(source) => {
                if let Some((note, mode)) = &source.declared_key {
                    debug!("notation declares key {note} {mode}");
                }
                if let Some(t) = &source.transpose {
                    self.sink.write_message(&format!(
                        "Detected transposition: \\transpose {} {} \
                         (LilyPond: {:+} semitones, Analysis: {:+} semitones)",
                        t.from, t.to, t.written_to_sounding, t.sounding_to_written
                    ))?;
                }
                self.notation = Some(source);
            }
            Err(err) => {
                self.sink.write_message(&format!(
                    "WARNING: Could not parse LilyPond file {}: {}",
                    path.display(),
                    err
                ))?;
            }
        }
        Ok(())
    }

    /// Run the complete harmonic analysis of one decoded score file.
    pub fn run(&mut self, score_path: &Path) -> Result<(), AnalyzeError> {
        self.state = AnalysisState::Uninitialized;
        self.sink
            .write_message("=== SACRED HARP HARMONIC ANALYSIS START ===")?;

        let decoded = match decode_file(score_path) {
            Ok(decoded) => decoded,
            Err(err) => {
                self.sink
                    .write_message(&format!("ERROR: Could not load MIDI file: {err}"))?;
                self.state = AnalysisState::Failed;
                return Err(err.into());
            }
        };
        self.state = AnalysisState::Loaded;
        for warning in &decoded.warnings {
            self.sink.write_message(warning)?;
        }

        self.analyze_score(&decoded.score, &score_path.display().to_string())
    }

    /// Analyze an already decoded score. Exposed for embedders that supply
    /// their own Score Model.
    pub fn analyze_score(&mut self, score: &Score, score_name: &str) -> Result<(), AnalyzeError> {
        if self.state == AnalysisState::Uninitialized {
            self.state = AnalysisState::Loaded;
        }
        self.sink.write_message(&format!(
            "Analyzing {} in {} {}, {}/{} time",
            score_name,
            score.key.tonic_name(),
            score.key.mode,
            score.meter.numerator,
            score.meter.denominator
        ))?;

        let (observations, snapshots) = self.build_timeline(score);
        if observations.is_empty() {
            self.sink.write_message("No chords detected in analysis")?;
            return Err(AnalyzeError::EmptyAnalysis);
        }

        let transpose_offset = self
            .notation
            .as_ref()
            .map(|n| n.transpose_offset())
            .unwrap_or(0);
        let total_duration = score.total_duration();

        let warnings =
            self.collect_voice_warnings(score, &observations, &snapshots, transpose_offset, total_duration);
        self.state = AnalysisState::Analyzed;
        debug!(
            "{} chord observations, {} voice warnings",
            observations.len(),
            warnings.len()
        );

        // Chord-by-chord log: problems only.
        for obs in &observations {
            if !obs.assessment.status.is_problem() {
                continue;
            }
            let mut entry = format!(
                "Bar {}, Beat {}: {} ({}) - {}: {}",
                obs.sample.measure,
                obs.sample.beat,
                obs.label(),
                obs.digits(),
                obs.assessment.status,
                obs.assessment.message
            );
            if obs.assessment.status == Status::Forbidden {
                if let Some(fix) = self.rules.fix_suggestion(obs.label(), score.key.mode) {
                    entry.push_str(&format!("\n→ Fix suggestion: {fix}"));
                }
            }
            self.sink.write_message(&entry)?;
        }

        for warning in &warnings {
            self.sink
                .write_message(&format!("VOICE LEADING WARNING: {warning}"))?;
        }

        // Full-progression analysis over every classified chord.
        let progression: Vec<&str> = observations
            .iter()
            .filter_map(|obs| obs.class.roman())
            .collect();
        if progression.len() > 1 {
            self.sink
                .write_message(&format!("PROGRESSION: {}", progression.join(" - ")))?;
            for matched in self.rules.matched_progressions(&progression) {
                self.sink.write_message(&format!(
                    "GOOD: Contains standard Sacred Harp progression: {matched}"
                ))?;
            }
            for error in self
                .rules
                .forbidden_in_sequence(&progression, score.key.mode)
            {
                self.sink.write_message(&format!("ERROR: {error}"))?;
            }
        }

        self.sink
            .write_message("=== SACRED HARP HARMONIC ANALYSIS END ===")?;
        self.state = AnalysisState::Reported;
        Ok(())
    }

    /// Classify every beat; silent beats produce no observation.
    fn build_timeline(&self, score: &Score) -> (Vec<ChordObservation>, Vec<[Option<u8>; 4]>) {
        let mut observations = Vec::new();
        let mut snapshots = Vec::new();
        for sample in score.beat_samples() {
            let pitches = score.pitches_at(sample.offset);
            let class = classify(&pitches, &score.key);
            if class == ChordClass::Silence {
                continue;
            }
            let assessment = match &class {
                ChordClass::Classified { roman, .. } => self.rules.assess(roman, score.key.mode),
                _ => self.rules.assess("Unknown", score.key.mode),
            };
            snapshots.push(score.voice_snapshot(sample.offset));
            observations.push(ChordObservation {
                sample,
                class,
                assessment,
            });
        }
        (observations, snapshots)
    }

    /// Voice-leading, range and fatigue warnings in reporting order.
    fn collect_voice_warnings(
        &self,
        score: &Score,
        observations: &[ChordObservation],
        snapshots: &[[Option<u8>; 4]],
        transpose_offset: i8,
        total_duration: f64,
    ) -> Vec<String> {
        let mut warnings = Vec::new();

        // Adjacent-degree dissonances and voice crossings, beat by beat.
        for (obs, snapshot) in observations.iter().zip(snapshots) {
            warnings.extend(check_adjacent_degrees(obs.class.degrees(), &obs.sample));
            if let Some(crossing) = check_voice_crossing(snapshot, transpose_offset, &obs.sample) {
                warnings.push(crossing);
            }
        }

        // Immediate range violations, annotated with source locations.
        for (obs, snapshot) in observations.iter().zip(snapshots) {
            for finding in check_immediate(self.ranges, snapshot, transpose_offset, &obs.sample) {
                let mut message = finding.message.clone();
                message.push_str(&self.location_block(
                    finding.voice,
                    obs.sample.offset,
                    total_duration,
                    &obs.sample,
                ));
                message.push_str(&format!("\n→ Fix suggestion: {}", finding.fix_suggestion));
                warnings.push(message);
            }
        }

        // Fatigue scan per voice over the observation history.
        for voice in Voice::ALL {
            let history: Vec<Option<FatigueSample>> = observations
                .iter()
                .zip(snapshots)
                .map(|(obs, snapshot)| {
                    snapshot[voice.index()].map(|midi| FatigueSample {
                        written: i16::from(midi) + i16::from(transpose_offset),
                        measure: obs.sample.measure,
                        beat: obs.sample.beat,
                    })
                })
                .collect();
            for finding in scan_fatigue(
                self.ranges,
                voice,
                &history,
                score.meter.beats_per_measure,
            ) {
                warnings.push(finding.message);
            }
        }

        // Treble/tenor motion over the whole piece.
        let mut tally = MotionTally::new();
        for pair in snapshots.windows(2) {
            tally.observe(&pair[0], &pair[1]);
        }
        if let Some(summary) = tally.summary() {
            warnings.push(summary);
        }

        warnings
    }

    /// Location and context block for a range finding, or nothing when the
    /// locator is unavailable. Locations are approximate by construction.
    fn location_block(
        &self,
        voice: Voice,
        offset: f64,
        total_duration: f64,
        sample: &BeatSample,
    ) -> String {
        let Some(notation) = &self.notation else {
            return String::new();
        };
        let Some(location) =
            notation.locate(voice, offset, total_duration, sample.measure, sample.beat)
        else {
            return String::new();
        };

        let source_name = notation.source_name.as_deref().unwrap_or("notation source");
        let mut block = format!(
            "\n→ Location: {} section, approximately line {} in {}",
            location.section_key(),
            location.estimated_line,
            source_name
        );
        let context = notation.context(&location, 3);
        if !context.is_empty() {
            block.push_str("\n→ Context:\n");
            block.push_str(&context.join("\n"));
        }
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::MemorySink;
    use crate::score::{Key, Meter, Mode, Part, PitchEvent};

    /// Four-voice score builder: one entry per beat per voice, rests as None.
    fn score_from_beats(beats: &[[Option<u8>; 4]], key: Key, meter: Meter) -> Score {
        let mut parts = vec![
            Part::default(),
            Part::default(),
            Part::default(),
            Part::default(),
        ];
        for (beat_idx, beat) in beats.iter().enumerate() {
            for (part_idx, pitch) in beat.iter().enumerate() {
                if let Some(midi) = pitch {
                    parts[part_idx].events.push(PitchEvent {
                        midi: *midi,
                        offset: beat_idx as f64 * meter.beat_duration,
                        duration: meter.beat_duration,
                    });
                }
            }
        }
        Score { parts, key, meter }
    }

    fn major_key() -> Key {
        Key::default()
    }

    #[test]
    fn test_forbidden_chord_logged_with_fix() {
        // B-D-F: vii° in C major.
        let score = score_from_beats(
            &[
                [Some(71), Some(74), Some(77), Some(47)],
                [Some(72), Some(76), Some(67), Some(48)],
            ],
            major_key(),
            Meter::default(),
        );
        let mut sink = MemorySink::new();
        let mut analyzer = Analyzer::new(&mut sink);
        analyzer.analyze_score(&score, "test").unwrap();
        assert_eq!(analyzer.state(), AnalysisState::Reported);

        assert!(sink.contains("vii° chord FORBIDDEN in Sacred Harp style"));
        assert!(sink.contains("→ Fix suggestion: Replace with V chord (sol-si-re)"));
        // The good tonic beat is kept out of the line-by-line log.
        assert!(!sink.contains("excellent choice"));
    }

    #[test]
    fn test_empty_score_is_distinct_failure() {
        let score = Score {
            parts: vec![],
            key: major_key(),
            meter: Meter::default(),
        };
        let mut sink = MemorySink::new();
        let mut analyzer = Analyzer::new(&mut sink);
        let result = analyzer.analyze_score(&score, "empty");
        assert!(matches!(result, Err(AnalyzeError::EmptyAnalysis)));
        assert_eq!(analyzer.state(), AnalysisState::Loaded);
        assert!(sink.contains("No chords detected in analysis"));
    }

    #[test]
    fn test_progression_reporting() {
        // I - vi - V - I, one chord per beat.
        let beats = [
            [Some(72), Some(67), Some(64), Some(48)], // I: C E G
            [Some(72), Some(69), Some(64), Some(45)], // vi: A C E
            [Some(71), Some(67), Some(62), Some(55)], // V: G B D
            [Some(72), Some(67), Some(64), Some(48)], // I
        ];
        let score = score_from_beats(&beats, major_key(), Meter::default());
        let mut sink = MemorySink::new();
        let mut analyzer = Analyzer::new(&mut sink);
        analyzer.analyze_score(&score, "test").unwrap();

        assert!(sink.contains("PROGRESSION: I - vi - V - I"));
        assert!(sink.contains("GOOD: Contains standard Sacred Harp progression: I - vi - V - I"));
    }

    #[test]
    fn test_forbidden_sequence_error_line() {
        let beats = [
            [Some(71), Some(74), Some(77), Some(47)], // vii°
            [Some(72), Some(76), Some(67), Some(48)], // I
        ];
        let score = score_from_beats(&beats, major_key(), Meter::default());
        let mut sink = MemorySink::new();
        let mut analyzer = Analyzer::new(&mut sink);
        analyzer.analyze_score(&score, "test").unwrap();
        assert!(sink.contains("ERROR: Forbidden vii° chord found in progression"));
    }

    #[test]
    fn test_voice_leading_warning_prefix() {
        // Bass above tenor on every beat.
        let beats = [
            [Some(72), Some(67), Some(60), Some(64)],
            [Some(72), Some(67), Some(60), Some(64)],
        ];
        let score = score_from_beats(&beats, major_key(), Meter::default());
        let mut sink = MemorySink::new();
        let mut analyzer = Analyzer::new(&mut sink);
        analyzer.analyze_score(&score, "test").unwrap();
        assert!(sink.contains("VOICE LEADING WARNING: Bar 1, Beat 1: Bass crosses above tenor"));
    }

    #[test]
    fn test_minor_mode_assessment() {
        // A-C-E in A minor: the degree map uses major-scale offsets, so the
        // minor third is dropped and the set reduces to the {1,5} dyad,
        // read as "I". That numeral is unlisted in the minor tiers.
        let key = Key {
            tonic_pc: 9,
            mode: Mode::Minor,
        };
        let beats = [[Some(69), Some(72), Some(76), Some(45)]; 2];
        let score = score_from_beats(&beats, key, Meter::default());
        let mut sink = MemorySink::new();
        let mut analyzer = Analyzer::new(&mut sink);
        analyzer.analyze_score(&score, "test").unwrap();
        // "I" is unlisted in the minor tiers: flagged for manual review.
        assert!(sink.contains("I chord - check Sacred Harp style guide"));
    }

    #[test]
    fn test_idempotent_runs_produce_identical_findings() {
        let beats = [
            [Some(72), Some(67), Some(64), Some(48)],
            [Some(71), Some(74), Some(77), Some(47)],
            [Some(72), Some(69), Some(64), Some(45)],
        ];
        let score = score_from_beats(&beats, major_key(), Meter::default());

        let mut first = MemorySink::new();
        Analyzer::new(&mut first).analyze_score(&score, "test").unwrap();
        let mut second = MemorySink::new();
        Analyzer::new(&mut second)
            .analyze_score(&score, "test")
            .unwrap();
        assert_eq!(first.messages, second.messages);
    }
}
