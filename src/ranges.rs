//! # Range & Fatigue Analyzer
//!
//! Per-voice vocal range tables and the checks built on them: immediate
//! critical/extreme register violations, and a sliding-window scan for
//! sustained extreme-register singing that tires real singers.
//!
//! The bounds are MIDI note numbers measured from a reference corpus of
//! Sacred Harp, Christian Harmony and Southern Harmony repertoire (12 songs,
//! 3074 notes; see the `range-survey` binary for the measurement tool).
//! All checks apply to the *written* pitch: when the notation source carries
//! a transposition, the sounding MIDI pitch is converted back to what the
//! performer reads before comparison.
//!
//! ## Severity model
//! - critical (bass only): below the unsingable floor, always reported
//! - extreme: outside the widest range ever observed in the corpus
//! - fatigue: soft percentile bounds breached persistently inside an
//!   8-beat window; never reported as an immediate violation
//!
//! ## Related Modules
//! - `score` - supplies the per-beat voice snapshots
//! - `analyzer` - appends source locations and writes findings to the log

use serde::Serialize;
use std::collections::HashSet;

use crate::score::{pitch_name, BeatSample, Voice};

/// Sliding window length for the fatigue scan: 8 beats (2 measures in 4/4).
pub const FATIGUE_WINDOW: usize = 8;

/// Range bounds for one voice, in MIDI note numbers.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct VoiceRange {
    /// Widest range ever observed in the reference corpus.
    pub absolute_low: i16,
    pub absolute_high: i16,
    /// Soft avoid-beyond thresholds, used only by the fatigue scan.
    pub percentile_10: i16,
    pub percentile_90: i16,
    /// Comfortable center of the voice.
    pub sweet_spot_low: i16,
    pub sweet_spot_high: i16,
    pub average: i16,
    /// Unsingable floor; only the bass carries one.
    pub critical_low: Option<i16>,
}

/// The per-voice range table, index-mapped like the score's parts.
#[derive(Debug, Clone, Copy)]
pub struct RangeTable {
    ranges: [VoiceRange; 4],
}

impl RangeTable {
    pub fn for_voice(&self, voice: Voice) -> &VoiceRange {
        &self.ranges[voice.index()]
    }
}

/// Measured Sacred Harp vocal ranges.
pub static SACRED_HARP_RANGES: RangeTable = RangeTable {
    ranges: [
        // Treble: D#4 .. G5, sweet spot A#4-D5 around C5.
        VoiceRange {
            absolute_low: 63,
            absolute_high: 79,
            percentile_10: 68,
            percentile_90: 76,
            sweet_spot_low: 70,
            sweet_spot_high: 74,
            average: 72,
            critical_low: None,
        },
        // Alto: A#3 .. G5, a 21-semitone span in the corpus.
        VoiceRange {
            absolute_low: 58,
            absolute_high: 79,
            percentile_10: 63,
            percentile_90: 71,
            sweet_spot_low: 65,
            sweet_spot_high: 69,
            average: 67,
            critical_low: None,
        },
        // Tenor: D4 .. A5, sweet spot G#4-D5 around B4.
        VoiceRange {
            absolute_low: 62,
            absolute_high: 81,
            percentile_10: 66,
            percentile_90: 76,
            sweet_spot_low: 68,
            sweet_spot_high: 74,
            average: 71,
            critical_low: None,
        },
        // Bass: G2 .. C4; G2 is also the never-go-below floor.
        VoiceRange {
            absolute_low: 43,
            absolute_high: 60,
            percentile_10: 47,
            percentile_90: 57,
            sweet_spot_low: 50,
            sweet_spot_high: 55,
            average: 52,
            critical_low: Some(43),
        },
    ],
};

/// Severity of an immediate range violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeSeverity {
    Critical,
    Extreme,
}

/// An immediate range violation at one beat.
#[derive(Debug, Clone, Serialize)]
pub struct RangeFinding {
    pub voice: Voice,
    pub measure: u32,
    pub beat: u32,
    #[serde(skip)]
    pub offset: f64,
    pub severity: RangeSeverity,
    /// Message body, already carrying the bar/beat prefix.
    pub message: String,
    pub fix_suggestion: &'static str,
}

/// Check one beat's voice snapshot for critical and extreme violations.
///
/// `transpose_offset` converts sounding MIDI pitch to written pitch; range
/// comparison always happens on the written pitch.
pub fn check_immediate(
    table: &RangeTable,
    snapshot: &[Option<u8>; 4],
    transpose_offset: i8,
    sample: &BeatSample,
) -> Vec<RangeFinding> {
    let mut findings = Vec::new();

    for voice in Voice::ALL {
        let Some(sounding) = snapshot[voice.index()] else {
            continue;
        };
        let range = table.for_voice(voice);
        let written = i16::from(sounding) + i16::from(transpose_offset);
        let spelled = pitch_name(sounding);

        if let Some(floor) = range.critical_low {
            if written <= floor {
                findings.push(RangeFinding {
                    voice,
                    measure: sample.measure,
                    beat: sample.beat,
                    offset: sample.offset,
                    severity: RangeSeverity::Critical,
                    message: format!(
                        "Bar {}, Beat {}: CRITICAL: {} note {} (MIDI {}, Analysis: {}) \
                         is too low to sing! Never go below G2.",
                        sample.measure,
                        sample.beat,
                        voice.title(),
                        spelled,
                        sounding,
                        written
                    ),
                    fix_suggestion: "Change note to higher octave or transpose passage up",
                });
                continue;
            }
        }

        if written < range.absolute_low {
            findings.push(RangeFinding {
                voice,
                measure: sample.measure,
                beat: sample.beat,
                offset: sample.offset,
                severity: RangeSeverity::Extreme,
                message: format!(
                    "Bar {}, Beat {}: EXTREME: {} note {} (MIDI {}, Analysis: {}) \
                     is below any note found in Sacred Harp repertoire.",
                    sample.measure,
                    sample.beat,
                    voice.title(),
                    spelled,
                    sounding,
                    written
                ),
                fix_suggestion: "Raise note by octave or reconsider voice assignment",
            });
        } else if written > range.absolute_high {
            findings.push(RangeFinding {
                voice,
                measure: sample.measure,
                beat: sample.beat,
                offset: sample.offset,
                severity: RangeSeverity::Extreme,
                message: format!(
                    "Bar {}, Beat {}: EXTREME: {} note {} (MIDI {}, Analysis: {}) \
                     is above any note found in Sacred Harp repertoire.",
                    sample.measure,
                    sample.beat,
                    voice.title(),
                    spelled,
                    sounding,
                    written
                ),
                fix_suggestion: "Lower note by octave or transpose passage down",
            });
        }
    }

    findings
}

/// One voice's sample in the fatigue history: written pitch plus position.
#[derive(Debug, Clone, Copy)]
pub struct FatigueSample {
    pub written: i16,
    pub measure: u32,
    pub beat: u32,
}

/// Fatigue severities, high register taking precedence over low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FatigueSeverity {
    SevereHigh,
    ModerateHigh,
    HighStrain,
    SevereLow,
    ModerateLow,
    LowStrain,
}

/// A windowed fatigue finding for one voice over a bar range.
#[derive(Debug, Clone, Serialize)]
pub struct FatigueFinding {
    pub voice: Voice,
    pub start_measure: u32,
    pub end_measure: u32,
    pub severity: FatigueSeverity,
    pub message: String,
}

/// Scan one voice's beat-by-beat written-pitch history for fatigue.
///
/// Slides an [`FATIGUE_WINDOW`]-beat window one sample at a time. Within a
/// window, counts samples above percentile_90 and below percentile_10 and
/// tracks the longest uninterrupted high/low run; absent samples reset the
/// run counters but not the window counts. At most one finding is emitted
/// per (window-start-measure, window-end-measure) span, most severe first,
/// high register before low.
pub fn scan_fatigue(
    table: &RangeTable,
    voice: Voice,
    history: &[Option<FatigueSample>],
    beats_per_measure: u8,
) -> Vec<FatigueFinding> {
    let mut findings = Vec::new();
    if history.len() < FATIGUE_WINDOW {
        return findings;
    }

    let range = table.for_voice(voice);
    let bpm = usize::from(beats_per_measure.max(1));
    let mut reported: HashSet<(u32, u32)> = HashSet::new();

    for (start, window) in history.windows(FATIGUE_WINDOW).enumerate() {
        let mut extreme_high = 0usize;
        let mut extreme_low = 0usize;
        let mut consecutive_high = 0usize;
        let mut consecutive_low = 0usize;
        let mut max_consecutive_high = 0usize;
        let mut max_consecutive_low = 0usize;

        for sample in window {
            let Some(sample) = sample else {
                consecutive_high = 0;
                consecutive_low = 0;
                continue;
            };
            if sample.written > range.percentile_90 {
                extreme_high += 1;
                consecutive_high += 1;
                consecutive_low = 0;
                max_consecutive_high = max_consecutive_high.max(consecutive_high);
            } else if sample.written < range.percentile_10 {
                extreme_low += 1;
                consecutive_low += 1;
                consecutive_high = 0;
                max_consecutive_low = max_consecutive_low.max(consecutive_low);
            } else {
                consecutive_high = 0;
                consecutive_low = 0;
            }
        }

        let start_measure = window[0]
            .map(|s| s.measure)
            .unwrap_or((start / bpm) as u32 + 1);
        let end_measure = window[FATIGUE_WINDOW - 1]
            .map(|s| s.measure)
            .unwrap_or(((start + FATIGUE_WINDOW - 1) / bpm) as u32 + 1);
        let span = (start_measure, end_measure);
        if reported.contains(&span) {
            continue;
        }

        let sustained_high = |count: usize| {
            format!(
                "SUSTAINED FATIGUE: {} spends {} of {} beats in top 10% range \
                 (bars {}-{}) - may tire singers",
                voice.title(),
                count,
                FATIGUE_WINDOW,
                start_measure,
                end_measure
            )
        };
        let sustained_low = |count: usize| {
            format!(
                "SUSTAINED FATIGUE: {} spends {} of {} beats in bottom 10% range \
                 (bars {}-{}) - may tire singers",
                voice.title(),
                count,
                FATIGUE_WINDOW,
                start_measure,
                end_measure
            )
        };

        let finding = if extreme_high >= 6 {
            Some((FatigueSeverity::SevereHigh, sustained_high(extreme_high)))
        } else if extreme_high >= 5 {
            Some((FatigueSeverity::ModerateHigh, sustained_high(extreme_high)))
        } else if max_consecutive_high >= 4 {
            Some((
                FatigueSeverity::HighStrain,
                format!(
                    "FATIGUE WARNING: {} has {} consecutive high notes (bars {}-{}) \
                     - may strain singers",
                    voice.title(),
                    max_consecutive_high,
                    start_measure,
                    end_measure
                ),
            ))
        } else if extreme_low >= 6 {
            Some((FatigueSeverity::SevereLow, sustained_low(extreme_low)))
        } else if extreme_low >= 5 {
            Some((FatigueSeverity::ModerateLow, sustained_low(extreme_low)))
        } else if max_consecutive_low >= 4 {
            Some((
                FatigueSeverity::LowStrain,
                format!(
                    "FATIGUE WARNING: {} has {} consecutive low notes (bars {}-{}) \
                     - may strain singers",
                    voice.title(),
                    max_consecutive_low,
                    start_measure,
                    end_measure
                ),
            ))
        } else {
            None
        };

        if let Some((severity, message)) = finding {
            reported.insert(span);
            findings.push(FatigueFinding {
                voice,
                start_measure,
                end_measure,
                severity,
                message,
            });
        }
    }

    findings
}
