//! Reference-corpus vocal range survey.
//!
//! Downloads (or reads) Sacred Harp MusicXML files, extracts every pitch
//! per voice part, and prints the range statistics the analyzer's built-in
//! range table was measured from. `.mxl` inputs are zip containers; the
//! first non-META-INF XML member is the score.
//!
//! Usage:
//!   range-survey [--out ranges.yaml] [url-or-path ...]
//!
//! With no inputs, the original twelve shapenote.net reference files are
//! fetched.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::{Cursor, Read};
use std::process;

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;

use fasola::score::pitch_name;

/// The reference corpus the built-in range table was measured from.
const DEFAULT_URLS: [&str; 12] = [
    "https://shapenote.net/musicxml/33b.mxl",
    "https://shapenote.net/musicxml/45t.mxl",
    "https://shapenote.net/musicxml/99.mxl",
    "https://shapenote.net/musicxml/197d.mxl",
    "https://shapenote.net/musicxml/229.mxl",
    "https://shapenote.net/musicxml/528.mxl",
    "https://shapenote.net/musicxml/CHN-121t.mxl",
    "https://shapenote.net/musicxml/CHA-172.mxl",
    "https://shapenote.net/musicxml/309.mxl",
    "https://shapenote.net/musicxml/C-196d.mxl",
    "https://shapenote.net/musicxml/SH-254.mxl",
    "https://shapenote.net/musicxml/CHA-110.mxl",
];

/// Aggregate bounds for one voice, shaped like the analyzer's range table.
#[derive(Debug, Serialize)]
struct VoiceRangeSummary {
    absolute_low: i32,
    absolute_high: i32,
    percentile_10: i32,
    percentile_90: i32,
    sweet_spot_low: i32,
    sweet_spot_high: i32,
    average: i32,
    notes_analyzed: usize,
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut out_path: Option<String> = None;
    let mut inputs: Vec<String> = Vec::new();

    let mut idx = 0;
    while idx < args.len() {
        if args[idx] == "--out" {
            let Some(path) = args.get(idx + 1) else {
                eprintln!("Usage: range-survey [--out ranges.yaml] [url-or-path ...]");
                process::exit(1);
            };
            out_path = Some(path.clone());
            idx += 2;
        } else {
            inputs.push(args[idx].clone());
            idx += 1;
        }
    }
    if inputs.is_empty() {
        inputs = DEFAULT_URLS.iter().map(|s| s.to_string()).collect();
    }

    println!("Analyzing Sacred Harp vocal ranges from MusicXML files...");

    let mut all_ranges: BTreeMap<String, Vec<i32>> = BTreeMap::new();
    let mut songs = Vec::new();

    for input in &inputs {
        let xml = match load_score_xml(input) {
            Ok(xml) => xml,
            Err(e) => {
                eprintln!("Error with {input}: {e}");
                continue;
            }
        };
        match parse_musicxml_ranges(&xml) {
            Ok((title, voices)) if !voices.is_empty() => {
                for (voice, pitches) in &voices {
                    all_ranges
                        .entry(voice.clone())
                        .or_default()
                        .extend_from_slice(pitches);
                }
                println!("✓ Analyzed: {title}");
                songs.push((title, voices));
            }
            Ok(_) => eprintln!("Error with {input}: no pitched parts found"),
            Err(e) => eprintln!("Error with {input}: {e}"),
        }
    }

    print_song_reports(&songs);
    let summary = print_overall_statistics(&all_ranges);

    if let Some(path) = out_path {
        match serde_yaml::to_string(&summary) {
            Ok(yaml) => {
                if let Err(e) = fs::write(&path, yaml) {
                    eprintln!("Error writing {path}: {e}");
                    process::exit(1);
                }
                println!("\nWrote range summary to {path}");
            }
            Err(e) => {
                eprintln!("Error serializing summary: {e}");
                process::exit(1);
            }
        }
    }
}

/// Fetch a URL or read a local file, unpacking `.mxl` zip containers.
fn load_score_xml(input: &str) -> Result<String, String> {
    let bytes = if input.starts_with("http://") || input.starts_with("https://") {
        let response = reqwest::blocking::get(input).map_err(|e| e.to_string())?;
        response
            .error_for_status()
            .map_err(|e| e.to_string())?
            .bytes()
            .map_err(|e| e.to_string())?
            .to_vec()
    } else {
        fs::read(input).map_err(|e| e.to_string())?
    };

    if bytes.starts_with(b"PK\x03\x04") {
        extract_mxl(&bytes)
    } else {
        String::from_utf8(bytes).map_err(|e| e.to_string())
    }
}

/// Pull the score XML out of a compressed `.mxl` container.
fn extract_mxl(bytes: &[u8]) -> Result<String, String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let score_index = (0..archive.len()).find(|&i| {
        archive
            .by_index(i)
            .map(|file| {
                let name = file.name();
                name.ends_with(".xml") && !name.starts_with("META-INF")
            })
            .unwrap_or(false)
    });
    let Some(index) = score_index else {
        return Err("no score XML member in archive".to_string());
    };
    let mut file = archive.by_index(index).map_err(|e| e.to_string())?;
    let mut xml = String::new();
    file.read_to_string(&mut xml).map_err(|e| e.to_string())?;
    Ok(xml)
}

/// Convert MusicXML pitch spelling to a MIDI note number.
fn midi_from_pitch(step: char, alter: i32, octave: i32) -> i32 {
    let base = match step {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => 0,
    };
    (octave + 1) * 12 + base + alter
}

/// Extract (title, per-voice MIDI pitches) from a MusicXML document.
fn parse_musicxml_ranges(xml: &str) -> Result<(String, BTreeMap<String, Vec<i32>>), String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut title = "Unknown".to_string();
    let mut part_names: BTreeMap<String, String> = BTreeMap::new();
    let mut voices: BTreeMap<String, Vec<i32>> = BTreeMap::new();

    let mut current_tag: Option<&'static str> = None;
    let mut current_score_part: Option<String> = None;
    let mut current_voice: Option<String> = None;
    let mut in_pitch = false;
    let mut step: Option<char> = None;
    let mut alter = 0i32;
    let mut octave: Option<i32> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"work-title" => current_tag = Some("work-title"),
                b"score-part" => {
                    current_score_part = attribute(e, b"id");
                }
                b"part-name" => current_tag = Some("part-name"),
                b"part" => {
                    current_voice = attribute(e, b"id").map(|id| {
                        part_names
                            .get(&id)
                            .cloned()
                            .unwrap_or_else(|| format!("part_{id}"))
                    });
                }
                b"pitch" => {
                    in_pitch = true;
                    step = None;
                    alter = 0;
                    octave = None;
                }
                b"step" => current_tag = Some("step"),
                b"alter" => current_tag = Some("alter"),
                b"octave" => current_tag = Some("octave"),
                _ => {}
            },
            Ok(Event::Text(ref t)) => {
                let text = t.unescape().map_err(|e| e.to_string())?.into_owned();
                match current_tag {
                    Some("work-title") => title = text,
                    Some("part-name") => {
                        if let Some(id) = &current_score_part {
                            part_names.insert(id.clone(), text.to_lowercase());
                        }
                    }
                    Some("step") if in_pitch => step = text.chars().next(),
                    Some("alter") if in_pitch => alter = text.trim().parse().unwrap_or(0),
                    Some("octave") if in_pitch => octave = text.trim().parse().ok(),
                    _ => {}
                }
                current_tag = None;
            }
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"pitch" {
                    in_pitch = false;
                    if let (Some(step), Some(octave), Some(voice)) = (step, octave, &current_voice)
                    {
                        voices
                            .entry(voice.clone())
                            .or_default()
                            .push(midi_from_pitch(step, alter, octave));
                    }
                }
                current_tag = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
    }

    Ok((title, voices))
}

fn attribute(e: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| String::from_utf8(a.value.into_owned()).ok())
}

/// Index-based percentile over a sorted sample, matching the measurement
/// method the built-in table was derived with.
fn percentile(sorted: &[i32], fraction: f64) -> i32 {
    let idx = ((fraction * sorted.len() as f64) as usize).min(sorted.len() - 1);
    sorted[idx]
}

fn print_song_reports(songs: &[(String, BTreeMap<String, Vec<i32>>)]) {
    println!();
    println!("{}", "=".repeat(60));
    println!("INDIVIDUAL SONG ANALYSIS");
    println!("{}", "=".repeat(60));

    for (title, voices) in songs {
        println!();
        println!("{title}");
        println!("{}", "-".repeat(title.chars().count()));
        for (voice, pitches) in voices {
            let Some(&min) = pitches.iter().min() else {
                continue;
            };
            let max = *pitches.iter().max().unwrap();
            println!(
                "{:>8}: {:>4} to {:<4} (MIDI {:>2}-{:<2}, range: {} semitones)",
                voice.to_uppercase(),
                pitch_name(min as u8),
                pitch_name(max as u8),
                min,
                max,
                max - min
            );
        }
    }
}

fn print_overall_statistics(
    all_ranges: &BTreeMap<String, Vec<i32>>,
) -> BTreeMap<String, VoiceRangeSummary> {
    println!();
    println!("{}", "=".repeat(60));
    println!("OVERALL SACRED HARP VOCAL RANGES");
    println!("{}", "=".repeat(60));

    let mut summary = BTreeMap::new();
    for (voice, pitches) in all_ranges {
        if pitches.is_empty() {
            continue;
        }
        let mut sorted = pitches.clone();
        sorted.sort_unstable();
        let min = sorted[0];
        let max = sorted[sorted.len() - 1];
        let average = sorted.iter().sum::<i32>() as f64 / sorted.len() as f64;
        let p10 = percentile(&sorted, 0.10);
        let p90 = percentile(&sorted, 0.90);
        let p25 = percentile(&sorted, 0.25);
        let p75 = percentile(&sorted, 0.75);

        println!();
        println!("{} ({} notes analyzed):", voice.to_uppercase(), sorted.len());
        println!(
            "  Absolute range: {} to {} (MIDI {}-{})",
            pitch_name(min as u8),
            pitch_name(max as u8),
            min,
            max
        );
        println!("  Range span: {} semitones", max - min);
        println!(
            "  Average pitch: {} (MIDI {:.1})",
            pitch_name(average.round() as u8),
            average
        );
        println!(
            "  10th-90th percentile: {} to {} (MIDI {}-{})",
            pitch_name(p10 as u8),
            pitch_name(p90 as u8),
            p10,
            p90
        );
        println!(
            "  25th-75th percentile: {} to {} (MIDI {}-{})",
            pitch_name(p25 as u8),
            pitch_name(p75 as u8),
            p25,
            p75
        );

        summary.insert(
            voice.clone(),
            VoiceRangeSummary {
                absolute_low: min,
                absolute_high: max,
                percentile_10: p10,
                percentile_90: p90,
                sweet_spot_low: p25,
                sweet_spot_high: p75,
                average: average.round() as i32,
                notes_analyzed: sorted.len(),
            },
        );
    }
    summary
}
