//! # Error Types
//!
//! This module defines all error types for the fasola analyzer.
//!
//! Only a failed score decode is fatal to a run. Every other condition
//! (key/meter detection, notation-source parsing) is recovered locally with
//! a documented default and surfaces as a warning line in the harmony log,
//! never as an error from the pipeline.
//!
//! ## Error Types
//! - `DecodeError` - the MIDI file could not be read or parsed
//! - `AnalyzeError` - run-level failures (decode, empty analysis, log sink)

use thiserror::Error;

/// Failure to turn a MIDI file into a Score Model.
///
/// Fatal for the analysis run: no partial analysis is attempted.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The file could not be read from disk.
    #[error("could not read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The bytes are not a well-formed Standard MIDI File.
    #[error("malformed MIDI data: {0}")]
    Malformed(#[from] midly::Error),

    /// SMPTE-timed files carry no beat grid to analyze against.
    #[error("SMPTE-timed MIDI files are not supported")]
    SmpteTiming,
}

/// Run-level analysis error.
///
/// # Example
/// ```
/// # use fasola::AnalyzeError;
/// let err = AnalyzeError::EmptyAnalysis;
/// assert_eq!(err.to_string(), "no chords detected in analysis");
/// ```
#[derive(Error, Debug)]
pub enum AnalyzeError {
    /// The score decoder failed; see [`DecodeError`].
    #[error("could not load score: {0}")]
    Decode(#[from] DecodeError),

    /// The score decoded but produced no chord observations (silent or
    /// unparseable content). Distinct from a decode failure: the run
    /// completes but yields nothing to report.
    #[error("no chords detected in analysis")]
    EmptyAnalysis,

    /// The harmony log sink could not be written.
    #[error("could not write harmony log: {0}")]
    Sink(#[from] std::io::Error),
}
