pub mod analyzer;
pub mod chord;
pub mod decode;
pub mod error;
pub mod leading;
pub mod notation;
pub mod ranges;
pub mod report;
pub mod rules;
pub mod score;

pub use analyzer::{AnalysisState, Analyzer};
pub use decode::{decode_file, Decoded};
pub use error::{AnalyzeError, DecodeError};
pub use report::{FileSink, HarmonySink, MemorySink};
pub use score::{Key, Meter, Mode, Score, Voice};

use std::path::Path;

/// Run one complete harmonic analysis, appending findings to the log file.
/// This is the main entry point for the library.
///
/// The notation source is optional; without it the analysis is identical
/// but findings carry no source-location annotations.
pub fn run_analysis(
    score_path: &Path,
    log_path: &Path,
    notation_path: Option<&Path>,
) -> Result<(), AnalyzeError> {
    let mut sink = FileSink::open(log_path)?;
    let mut analyzer = Analyzer::new(&mut sink);
    if let Some(path) = notation_path {
        analyzer.load_notation(path)?;
    }
    analyzer.run(score_path)
}
