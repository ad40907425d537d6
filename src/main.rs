use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::thread;
use std::time::{Duration, SystemTime};

use fasola::{AnalyzeError, Analyzer, FileSink};

const DEFAULT_LOG: &str = "harmony.log";
const WATCH_INTERVAL: Duration = Duration::from_secs(2);

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let watch = args[1] == "--watch";
    let positional: Vec<&String> = if watch {
        args[2..].iter().collect()
    } else {
        args[1..].iter().collect()
    };

    let Some(score_path) = positional.first().map(|s| PathBuf::from(s.as_str())) else {
        print_usage();
        process::exit(1);
    };
    let log_path = positional
        .get(1)
        .map(|s| PathBuf::from(s.as_str()))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG));
    let notation_path = positional.get(2).map(|s| PathBuf::from(s.as_str()));

    if watch {
        if let Err(e) = watch_score_file(&score_path, &log_path, notation_path.as_deref()) {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    } else {
        match fasola::run_analysis(&score_path, &log_path, notation_path.as_deref()) {
            Ok(()) => {
                println!("Analysis complete. Check {} for results.", log_path.display());
                if let Some(notation) = &notation_path {
                    println!(
                        "Source locations from {} included in analysis.",
                        notation.display()
                    );
                }
            }
            Err(e) => {
                eprintln!("Analysis failed: {e}");
                process::exit(1);
            }
        }
    }
}

fn print_usage() {
    eprintln!("Usage: fasola <score.mid> [harmony.log] [source.ly]");
    eprintln!("       fasola --watch <score.mid> [harmony.log] [source.ly]");
    eprintln!();
    eprintln!("The optional LilyPond source enables approximate source location reporting.");
}

/// Poll the score file every two seconds and re-analyze on change.
///
/// The notation source is parsed once up front; each change re-decodes the
/// score and appends a fresh report to the log. Stop with an interrupt.
fn watch_score_file(
    score_path: &Path,
    log_path: &Path,
    notation_path: Option<&Path>,
) -> Result<(), AnalyzeError> {
    let mut sink = FileSink::open(log_path)?;
    let mut analyzer = Analyzer::new(&mut sink);
    if let Some(path) = notation_path {
        analyzer.load_notation(path)?;
    }

    println!("Watching {} for changes...", score_path.display());
    println!("Harmony feedback will be logged to {}", log_path.display());
    if let Some(path) = notation_path {
        println!("LilyPond source locations from {}", path.display());
    }

    let mut last_modified: Option<SystemTime> = None;
    loop {
        if let Some(modified) = modification_time(score_path) {
            if last_modified.map_or(true, |last| modified > last) {
                println!("MIDI file updated, analyzing...");
                if let Err(e) = analyzer.run(score_path) {
                    eprintln!("Analysis failed: {e}");
                }
                last_modified = Some(modified);
            }
        }
        thread::sleep(WATCH_INTERVAL);
    }
}

fn modification_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
