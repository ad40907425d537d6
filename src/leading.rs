//! Voice-leading checks: adjacent-degree dissonances, voice crossings, and
//! the treble/tenor parallel-motion tally.
//!
//! The adjacent-degree and crossing findings are advisory. Shape-note
//! writing tolerates all of them in passing; the messages say when.

use crate::score::{BeatSample, Voice};

/// The three adjacent-degree pairs worth flagging, with their solmization
/// names and genre acceptability notes.
const ADJACENT_PAIRS: [(u8, u8, &str, &str); 3] = [
    (
        1,
        2,
        "do-re",
        "Brief passing dissonance is acceptable, but avoid sustaining both notes",
    ),
    (
        3,
        4,
        "mi-fa",
        "Common at cadences, but avoid prolonged mi-fa combinations",
    ),
    (
        7,
        1,
        "si-do",
        "Natural at cadences (si resolves to do), acceptable when brief",
    ),
];

/// Flag simultaneous adjacent scale degrees in one beat's degree set.
pub fn check_adjacent_degrees(degrees: &[u8], sample: &BeatSample) -> Vec<String> {
    let mut warnings = Vec::new();
    for (a, b, name, note) in ADJACENT_PAIRS {
        if degrees.contains(&a) && degrees.contains(&b) {
            warnings.push(format!(
                "Bar {}, Beat {}: Adjacent scale degrees {} create dissonance\
                 \n→ Fix suggestion: {}",
                sample.measure, sample.beat, name, note
            ));
        }
    }
    warnings
}

/// Flag the bass sounding above the tenor at one beat.
///
/// Comparison happens on written pitches; a uniform transposition offset
/// cannot change the outcome, but the written values are what a reader of
/// the notation source will see.
pub fn check_voice_crossing(
    snapshot: &[Option<u8>; 4],
    transpose_offset: i8,
    sample: &BeatSample,
) -> Option<String> {
    let bass = snapshot[Voice::Bass.index()]?;
    let tenor = snapshot[Voice::Tenor.index()]?;
    let bass_written = i16::from(bass) + i16::from(transpose_offset);
    let tenor_written = i16::from(tenor) + i16::from(transpose_offset);
    if bass_written > tenor_written {
        Some(format!(
            "Bar {}, Beat {}: Bass crosses above tenor (acceptable when tenor is low)",
            sample.measure, sample.beat
        ))
    } else {
        None
    }
}

/// Running parallel-motion tally between treble and tenor.
///
/// Counts consecutive beat pairs where both voices sound at both beats and
/// both moved; motion is parallel when the semitone deltas share a sign.
/// One tally per analysis run; never share across runs.
#[derive(Debug, Default)]
pub struct MotionTally {
    parallel: usize,
    total: usize,
}

impl MotionTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe one consecutive pair of voice snapshots.
    pub fn observe(&mut self, previous: &[Option<u8>; 4], current: &[Option<u8>; 4]) {
        let (Some(prev_treble), Some(prev_tenor)) = (
            previous[Voice::Treble.index()],
            previous[Voice::Tenor.index()],
        ) else {
            return;
        };
        let (Some(cur_treble), Some(cur_tenor)) = (
            current[Voice::Treble.index()],
            current[Voice::Tenor.index()],
        ) else {
            return;
        };

        let treble_motion = i16::from(cur_treble) - i16::from(prev_treble);
        let tenor_motion = i16::from(cur_tenor) - i16::from(prev_tenor);
        if treble_motion != 0 && tenor_motion != 0 {
            self.total += 1;
            if (treble_motion > 0) == (tenor_motion > 0) {
                self.parallel += 1;
            }
        }
    }

    /// Fraction of observed motion that was parallel, if any motion occurred.
    pub fn ratio(&self) -> Option<f64> {
        (self.total > 0).then(|| self.parallel as f64 / self.total as f64)
    }

    /// One summary warning when parallel motion exceeds 60% of the piece.
    pub fn summary(&self) -> Option<String> {
        let ratio = self.ratio()?;
        (ratio > 0.6).then(|| {
            format!(
                "WARNING: Treble and tenor move in parallel motion {:.1}% of the time. \
                 Sacred Harp prefers contrary motion.",
                ratio * 100.0
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BeatSample {
        BeatSample {
            measure: 2,
            beat: 3,
            offset: 0.0,
        }
    }

    #[test]
    fn test_adjacent_degree_pairs() {
        let warnings = check_adjacent_degrees(&[1, 2, 5], &sample());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("do-re create dissonance"));
        assert!(warnings[0].contains("→ Fix suggestion:"));

        let warnings = check_adjacent_degrees(&[1, 3, 4, 7], &sample());
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("mi-fa"));
        assert!(warnings[1].contains("si-do"));

        assert!(check_adjacent_degrees(&[1, 3, 5], &sample()).is_empty());
    }

    #[test]
    fn test_voice_crossing() {
        // Bass D4 above tenor C4.
        let snapshot = [Some(72), Some(67), Some(60), Some(62)];
        let warning = check_voice_crossing(&snapshot, 0, &sample()).unwrap();
        assert!(warning.contains("Bass crosses above tenor"));
        assert!(warning.starts_with("Bar 2, Beat 3:"));

        // Normal spacing: no warning.
        let snapshot = [Some(72), Some(67), Some(64), Some(50)];
        assert!(check_voice_crossing(&snapshot, 0, &sample()).is_none());

        // Missing tenor: nothing to compare.
        let snapshot = [Some(72), Some(67), None, Some(62)];
        assert!(check_voice_crossing(&snapshot, 0, &sample()).is_none());
    }

    #[test]
    fn test_parallel_motion_tally() {
        let mut tally = MotionTally::new();
        // Both voices rise: parallel.
        tally.observe(
            &[Some(72), None, Some(64), None],
            &[Some(74), None, Some(65), None],
        );
        // Contrary motion.
        tally.observe(
            &[Some(74), None, Some(65), None],
            &[Some(72), None, Some(67), None],
        );
        // Treble holds still: not counted.
        tally.observe(
            &[Some(72), None, Some(67), None],
            &[Some(72), None, Some(69), None],
        );
        assert_eq!(tally.ratio(), Some(0.5));
        assert!(tally.summary().is_none());
    }

    #[test]
    fn test_parallel_motion_summary_above_threshold() {
        let mut tally = MotionTally::new();
        for _ in 0..7 {
            tally.observe(
                &[Some(72), None, Some(64), None],
                &[Some(74), None, Some(66), None],
            );
        }
        for _ in 0..3 {
            tally.observe(
                &[Some(74), None, Some(64), None],
                &[Some(72), None, Some(66), None],
            );
        }
        let summary = tally.summary().unwrap();
        assert!(summary.contains("parallel motion 70.0% of the time"));
    }

    #[test]
    fn test_no_motion_yields_no_summary() {
        let tally = MotionTally::new();
        assert!(tally.ratio().is_none());
        assert!(tally.summary().is_none());
    }
}
